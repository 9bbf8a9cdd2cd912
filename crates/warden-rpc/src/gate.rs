//! Authorization policies and the gate that consults them.
//!
//! The gate asks its policy on every call and never caches the answer,
//! since a policy may depend on state this layer cannot see. A policy that
//! errors is treated as a denial.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, trace};
use warden_identity::PublicId;

/// Error returned by a failing policy.
pub type PolicyError = Box<dyn std::error::Error + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Policy trait
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable allow/deny decision for a method and caller identity.
///
/// # Example
///
/// ```ignore
/// struct OnlyEcho;
///
/// #[async_trait]
/// impl AuthorizationPolicy for OnlyEcho {
///     async fn is_node_authorized(&self, method: &str, _node: &PublicId) -> Result<bool, PolicyError> {
///         Ok(method == "Echo")
///     }
/// }
/// ```
#[async_trait]
pub trait AuthorizationPolicy: Send + Sync {
    /// Decide whether `node_id` may call `method`.
    async fn is_node_authorized(
        &self,
        method: &str,
        node_id: &PublicId,
    ) -> std::result::Result<bool, PolicyError>;
}

/// Allows every call. The default until a deployment supplies a real policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthorizationPolicy for AllowAll {
    async fn is_node_authorized(
        &self,
        _method: &str,
        _node_id: &PublicId,
    ) -> std::result::Result<bool, PolicyError> {
        Ok(true)
    }
}

/// Denies every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl AuthorizationPolicy for DenyAll {
    async fn is_node_authorized(
        &self,
        _method: &str,
        _node_id: &PublicId,
    ) -> std::result::Result<bool, PolicyError> {
        Ok(false)
    }
}

/// Allows only listed identities, optionally only for listed methods.
#[derive(Debug, Clone, Default)]
pub struct IdentityAllowList {
    identities: HashSet<PublicId>,
    methods: Option<HashSet<String>>,
}

impl IdentityAllowList {
    /// Allow `identities` to call any method.
    pub fn new(identities: impl IntoIterator<Item = PublicId>) -> Self {
        Self {
            identities: identities.into_iter().collect(),
            methods: None,
        }
    }

    /// Restrict the listed identities to `methods`.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Check the list synchronously.
    pub fn allows(&self, method: &str, node_id: &PublicId) -> bool {
        let method_ok = self
            .methods
            .as_ref()
            .is_none_or(|methods| methods.contains(method));
        method_ok && self.identities.contains(node_id)
    }
}

#[async_trait]
impl AuthorizationPolicy for IdentityAllowList {
    async fn is_node_authorized(
        &self,
        method: &str,
        node_id: &PublicId,
    ) -> std::result::Result<bool, PolicyError> {
        Ok(self.allows(method, node_id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gate
// ─────────────────────────────────────────────────────────────────────────────

/// Consults an [`AuthorizationPolicy`] once per call.
#[derive(Clone)]
pub struct AuthorizationGate {
    policy: Arc<dyn AuthorizationPolicy>,
}

impl AuthorizationGate {
    /// Create a gate backed by `policy`.
    pub fn new(policy: Arc<dyn AuthorizationPolicy>) -> Self {
        Self { policy }
    }

    /// Returns `true` only if the policy explicitly allows the call.
    ///
    /// A policy error is logged and counts as a denial.
    pub async fn authorize(&self, method: &str, node_id: &PublicId) -> bool {
        match self.policy.is_node_authorized(method, node_id).await {
            Ok(allowed) => {
                trace!(method = %method, node_id = %node_id, allowed, "Authorization decided");
                allowed
            }
            Err(e) => {
                error!(
                    method = %method,
                    node_id = %node_id,
                    error = %e,
                    "Authorization policy failed, denying call"
                );
                false
            }
        }
    }
}

impl Default for AuthorizationGate {
    fn default() -> Self {
        Self::new(Arc::new(AllowAll))
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(seed: &str) -> PublicId {
        warden_identity::derive(seed).unwrap().into_public_id()
    }

    struct FailingPolicy;

    #[async_trait]
    impl AuthorizationPolicy for FailingPolicy {
        async fn is_node_authorized(
            &self,
            _method: &str,
            _node_id: &PublicId,
        ) -> std::result::Result<bool, PolicyError> {
            Err("policy backend unreachable".into())
        }
    }

    struct CountingPolicy {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthorizationPolicy for CountingPolicy {
        async fn is_node_authorized(
            &self,
            _method: &str,
            _node_id: &PublicId,
        ) -> std::result::Result<bool, PolicyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_default_gate_allows() {
        let gate = AuthorizationGate::default();
        assert!(gate.authorize("Echo", &id("abc123")).await);
    }

    #[tokio::test]
    async fn test_deny_all() {
        let gate = AuthorizationGate::new(Arc::new(DenyAll));
        assert!(!gate.authorize("Echo", &id("abc123")).await);
    }

    #[tokio::test]
    async fn test_policy_error_denies() {
        let gate = AuthorizationGate::new(Arc::new(FailingPolicy));
        assert!(!gate.authorize("Echo", &id("abc123")).await);
    }

    #[tokio::test]
    async fn test_gate_does_not_cache() {
        let policy = Arc::new(CountingPolicy {
            calls: AtomicUsize::new(0),
        });
        let gate = AuthorizationGate::new(policy.clone());
        let node = id("abc123");

        for _ in 0..3 {
            assert!(gate.authorize("Echo", &node).await);
        }
        assert_eq!(policy.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_allow_list_identities() {
        let alice = id("alice");
        let bob = id("bob");
        let gate = AuthorizationGate::new(Arc::new(IdentityAllowList::new([alice.clone()])));

        assert!(gate.authorize("Echo", &alice).await);
        assert!(!gate.authorize("Echo", &bob).await);
    }

    #[test]
    fn test_allow_list_methods() {
        let alice = id("alice");
        let list = IdentityAllowList::new([alice.clone()]).with_methods(["Echo"]);

        assert!(list.allows("Echo", &alice));
        assert!(!list.allows("Announce", &alice));
        assert!(!list.allows("Echo", &id("bob")));
    }

    #[test]
    fn test_empty_allow_list_denies() {
        let list = IdentityAllowList::default();
        assert!(!list.allows("Echo", &id("alice")));
    }
}

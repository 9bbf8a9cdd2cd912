//! Per-call session authentication.
//!
//! For every call the interceptor:
//! 1. takes the `authorization` token, or synthesizes one from the service
//!    identity and the peer address
//! 2. resolves the token to a session (creating it on first sight)
//! 3. writes `nodeid` and `cacheid` with the session's public identity
//! 4. writes `userid`, derived from the caller's `userid` seed or freshly
//!    generated for this call
//! 5. asks the authorization gate
//! 6. dispatches to the wrapped method, or completes with
//!    `UNAUTHENTICATED: Invalid token`
//!
//! Failures before dispatch are logged and returned as
//! [`Error::InterceptorFault`] rather than turned into a reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};
use warden_identity::PublicId;
use warden_session::SessionCache;

use crate::call::{Metadata, Reply, ServerCall, Status};
use crate::error::{Error, Result};
use crate::gate::AuthorizationGate;
use crate::method::RpcMethod;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound token metadata key.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// Inbound user seed / outbound user identity metadata key.
pub const USER_ID_KEY: &str = "userid";

/// Outbound node identity metadata key.
pub const NODE_ID_KEY: &str = "nodeid";

/// Outbound cache identity metadata key (same value as `nodeid`).
pub const CACHE_ID_KEY: &str = "cacheid";

/// Message carried by the rejection status.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Interceptor behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterceptorConfig {
    /// Synthesize a token from the peer address when none is supplied.
    /// When off, such calls are rejected.
    pub synthesize_token_from_peer: bool,

    /// Write a `userid` identity on every call.
    /// When off, inbound `userid` metadata is left as is.
    pub cache_additional_user_id: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            synthesize_token_from_peer: true,
            cache_additional_user_id: true,
        }
    }
}

impl InterceptorConfig {
    /// Create a configuration with both switches on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Both switches off: token required, no `userid` rewrite.
    pub fn legacy() -> Self {
        Self {
            synthesize_token_from_peer: false,
            cache_additional_user_id: false,
        }
    }

    /// Enable or disable token synthesis from the peer address.
    pub fn with_synthesize_token_from_peer(mut self, enabled: bool) -> Self {
        self.synthesize_token_from_peer = enabled;
        self
    }

    /// Enable or disable the `userid` rewrite.
    pub fn with_cache_additional_user_id(mut self, enabled: bool) -> Self {
        self.cache_additional_user_id = enabled;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Call context
// ─────────────────────────────────────────────────────────────────────────────

/// Identities resolved for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedCallContext {
    /// Method being called.
    pub method: String,
    /// Public identity of the session.
    pub node_id: PublicId,
    /// Call-scoped user identity, if the rewrite is enabled.
    pub user_id: Option<PublicId>,
}

impl AuthorizedCallContext {
    /// Write `nodeid`, `cacheid` and (if present) `userid` into `metadata`.
    pub fn apply(&self, metadata: &mut Metadata) {
        metadata.insert(NODE_ID_KEY, self.node_id.as_str());
        metadata.insert(CACHE_ID_KEY, self.node_id.as_str());
        if let Some(user_id) = &self.user_id {
            metadata.insert(USER_ID_KEY, user_id.as_str());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interceptor
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticates, annotates and authorizes calls before dispatch.
#[derive(Debug)]
pub struct MethodInterceptor {
    service_identity: String,
    sessions: SessionCache,
    gate: AuthorizationGate,
    config: InterceptorConfig,
}

impl MethodInterceptor {
    /// Create an interceptor.
    ///
    /// `service_identity` is this service's own public identity; it keeps
    /// tokens synthesized for the same peer distinct across services.
    pub fn new(
        service_identity: impl Into<String>,
        sessions: SessionCache,
        gate: AuthorizationGate,
        config: InterceptorConfig,
    ) -> Self {
        Self {
            service_identity: service_identity.into(),
            sessions,
            gate,
            config,
        }
    }

    /// The session cache shared by all wrapped methods.
    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// The interceptor configuration.
    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Token used for an unauthenticated call from `peer`.
    ///
    /// Deterministic in the service identity and the peer address.
    pub fn synthesize_token(&self, peer: &str) -> warden_identity::Result<String> {
        let seed = format!("{}-{}", self.service_identity, peer);
        Ok(warden_identity::derive(seed)?.secret_hex())
    }

    /// Run the full per-call pipeline for `method`, dispatching to `inner`
    /// when allowed.
    pub async fn intercept(
        &self,
        method: &str,
        inner: &dyn RpcMethod,
        mut call: ServerCall,
    ) -> Result<Reply> {
        if call.is_cancelled() {
            debug!(method = %method, "Call cancelled before authentication");
            return Ok(Err(cancelled()));
        }

        let context = match self.authenticate(method, &call) {
            Ok(Some(context)) => context,
            Ok(None) => {
                warn!(method = %method, peer = %call.peer(), "Rejected call without token");
                return Ok(Err(Status::unauthenticated(INVALID_TOKEN_MESSAGE)));
            }
            Err(fault) => {
                error!(
                    method = %method,
                    peer = %call.peer(),
                    identity = fault.identity().unwrap_or("-"),
                    error = %fault,
                    "Interceptor fault"
                );
                return Err(fault);
            }
        };

        context.apply(call.metadata_mut());

        let allowed = tokio::select! {
            biased;
            _ = call.cancellation().cancelled() => {
                debug!(method = %method, node_id = %context.node_id, "Call cancelled during authorization");
                return Ok(Err(cancelled()));
            }
            allowed = self.gate.authorize(method, &context.node_id) => allowed,
        };

        if !allowed {
            warn!(
                method = %context.method,
                node_id = %context.node_id,
                "Unauthorized access rejected"
            );
            return Ok(Err(Status::unauthenticated(INVALID_TOKEN_MESSAGE)));
        }

        if call.is_cancelled() {
            debug!(method = %method, node_id = %context.node_id, "Call cancelled before dispatch");
            return Ok(Err(cancelled()));
        }

        trace!(method = %context.method, node_id = %context.node_id, "Dispatching call");
        inner.invoke(call).await
    }

    /// Resolve the session and user identity for a call.
    ///
    /// Returns `Ok(None)` when there is no token and synthesis is off.
    fn authenticate(&self, method: &str, call: &ServerCall) -> Result<Option<AuthorizedCallContext>> {
        let token = match call.metadata().get_non_empty(AUTHORIZATION_KEY) {
            Some(token) => token.to_string(),
            None if self.config.synthesize_token_from_peer => self
                .synthesize_token(call.peer())
                .map_err(|e| Error::fault(method, None, e))?,
            None => return Ok(None),
        };

        let session = self
            .sessions
            .resolve(&token)
            .map_err(|e| Error::fault(method, None, e))?;
        let node_id = session.public_id().clone();

        let user_id = if self.config.cache_additional_user_id {
            let identity = match call.metadata().get_non_empty(USER_ID_KEY) {
                Some(seed) => warden_identity::derive(seed)
                    .map_err(|e| Error::fault(method, Some(node_id.to_string()), e))?,
                None => warden_identity::generate(),
            };
            Some(identity.into_public_id())
        } else {
            None
        };

        Ok(Some(AuthorizedCallContext {
            method: method.to_string(),
            node_id,
            user_id,
        }))
    }
}

fn cancelled() -> Status {
    Status::cancelled("Call cancelled")
}

/// A method wrapped by a [`MethodInterceptor`].
pub struct InterceptedMethod {
    name: String,
    inner: Arc<dyn RpcMethod>,
    interceptor: Arc<MethodInterceptor>,
}

impl InterceptedMethod {
    /// Wrap `inner`, registered under `name`.
    pub fn new(
        name: impl Into<String>,
        inner: Arc<dyn RpcMethod>,
        interceptor: Arc<MethodInterceptor>,
    ) -> Self {
        Self {
            name: name.into(),
            inner,
            interceptor,
        }
    }

    /// The method name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl RpcMethod for InterceptedMethod {
    async fn invoke(&self, call: ServerCall) -> Result<Reply> {
        self.interceptor
            .intercept(&self.name, self.inner.as_ref(), call)
            .await
    }
}

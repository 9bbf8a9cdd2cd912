//! Handlers, method tables and service definitions.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::call::{Reply, ServerCall};
use crate::error::Result;

/// A unary RPC method implementation.
///
/// The outer `Result` is the fault channel to the runtime; the inner
/// [`Reply`] is what the caller sees.
#[async_trait]
pub trait RpcMethod: Send + Sync {
    /// Handle one call.
    async fn invoke(&self, call: ServerCall) -> Result<Reply>;
}

/// Method implementations keyed by method name.
pub type MethodTable = BTreeMap<String, Arc<dyn RpcMethod>>;

/// An [`RpcMethod`] backed by an async closure.
pub struct FnMethod<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> RpcMethod for FnMethod<F>
where
    F: Fn(ServerCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    async fn invoke(&self, call: ServerCall) -> Result<Reply> {
        (self.f)(call).await
    }
}

/// Wrap an async closure as a shareable method.
///
/// ```ignore
/// let echo = method_fn(|call: ServerCall| async move { Ok(Ok(call.into_payload())) });
/// ```
pub fn method_fn<F, Fut>(f: F) -> Arc<dyn RpcMethod>
where
    F: Fn(ServerCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    Arc::new(FnMethod { f })
}

/// Description of one method in a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Short method name, the key in the [`MethodTable`].
    pub name: String,
    /// Fully qualified path, e.g. `/pool.Node/Echo`.
    pub path: String,
}

/// Description of a service. Passed through the adapter untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    name: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDefinition {
    /// Create a definition for service `name` with no methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a method; its path is derived from the service name.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        let name = method.into();
        let path = format!("/{}/{}", self.name, name);
        self.methods.push(MethodDescriptor { name, path });
        self
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared methods.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Look up a method by short name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

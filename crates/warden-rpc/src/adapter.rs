//! Wraps a service's method table at registration time.

use std::sync::Arc;

use tracing::debug;

use crate::interceptor::{InterceptedMethod, MethodInterceptor};
use crate::method::{MethodTable, RpcMethod, ServiceDefinition};

/// Produces method tables whose every entry goes through a shared
/// [`MethodInterceptor`].
#[derive(Debug, Clone)]
pub struct ServiceAdapter {
    interceptor: Arc<MethodInterceptor>,
}

impl ServiceAdapter {
    /// Create an adapter around `interceptor`.
    pub fn new(interceptor: Arc<MethodInterceptor>) -> Self {
        Self { interceptor }
    }

    /// The shared interceptor.
    pub fn interceptor(&self) -> &Arc<MethodInterceptor> {
        &self.interceptor
    }

    /// Wrap every method in `methods`, keeping the keys.
    ///
    /// The definition is returned unchanged. Call once per service
    /// registration, not per call.
    pub fn adapt(
        &self,
        definition: ServiceDefinition,
        methods: MethodTable,
    ) -> (ServiceDefinition, MethodTable) {
        let wrapped: MethodTable = methods
            .into_iter()
            .map(|(name, inner)| {
                let method: Arc<dyn RpcMethod> = Arc::new(InterceptedMethod::new(
                    name.clone(),
                    inner,
                    Arc::clone(&self.interceptor),
                ));
                (name, method)
            })
            .collect();

        debug!(
            service = %definition.name(),
            methods = wrapped.len(),
            "Adapted service methods"
        );

        (definition, wrapped)
    }
}

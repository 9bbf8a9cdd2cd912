//! Session-authenticating interceptor for RPC services.
//!
//! Wraps every method of a service so that each inbound call is bound to a
//! derived identity, checked against an authorization policy, and annotated
//! with that identity before it reaches the handler.
//!
//! # Components
//!
//! - [`call`]: the runtime boundary: calls, metadata, status codes
//! - [`method`]: handler trait, method tables, service definitions
//! - [`gate`]: pluggable authorization policies and the gate that consults them
//! - [`interceptor`]: per-call token resolution, metadata rewrite, dispatch
//! - [`adapter`]: wraps a whole method table at registration time
//! - [`config`]: TOML configuration
//!
//! # Example
//!
//! ```ignore
//! use warden_rpc::{ServiceAdapter, WardenConfig};
//!
//! let config = WardenConfig::load_default()?;
//! let adapter = config.build_adapter()?;
//! let (definition, methods) = adapter.adapt(definition, methods);
//! ```

pub mod adapter;
pub mod call;
pub mod config;
pub mod error;
pub mod gate;
pub mod interceptor;
pub mod method;

pub use adapter::ServiceAdapter;
pub use call::{Code, Metadata, Reply, ServerCall, Status};
pub use config::{
    DEFAULT_SERVICE_IDENTITY, PolicyConfig, SessionSettings, WardenConfig, default_config_path,
    load_config,
};
pub use error::{ConfigError, Error, Result};
pub use gate::{
    AllowAll, AuthorizationGate, AuthorizationPolicy, DenyAll, IdentityAllowList, PolicyError,
};
pub use interceptor::{
    AuthorizedCallContext, InterceptedMethod, InterceptorConfig, MethodInterceptor,
};
pub use method::{MethodDescriptor, MethodTable, RpcMethod, ServiceDefinition, method_fn};

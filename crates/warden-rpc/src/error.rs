//! Error types for the interceptor and its configuration.

/// Result type alias for RPC method invocation.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error carried as the cause of a fault.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors escalated to the RPC runtime.
///
/// These are not replies: a denied or cancelled call still completes with a
/// [`Status`](crate::Status). An `Error` means the call itself blew up.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unexpected failure inside the interceptor before dispatch.
    #[error("Interceptor fault in {method}: {source}")]
    InterceptorFault {
        method: String,
        identity: Option<String>,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Build an interceptor fault.
    pub fn fault(
        method: impl Into<String>,
        identity: Option<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::InterceptorFault {
            method: method.into(),
            identity,
            source: source.into(),
        }
    }

    /// The session identity the fault happened under, if one was resolved.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Error::InterceptorFault { identity, .. } => identity.as_deref(),
        }
    }
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field has an unusable value.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    /// An allow-list entry is not a valid public identity.
    #[error("invalid identity in policy: {0}")]
    Identity(#[from] warden_identity::Error),
}

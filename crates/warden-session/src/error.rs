//! Error types for session cache operations.

/// Error type for session cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Identity derivation for a new session failed.
    #[error("Identity derivation failed: {0}")]
    Identity(#[from] warden_identity::Error),
}

/// Result type for session cache operations.
pub type Result<T> = std::result::Result<T, Error>;

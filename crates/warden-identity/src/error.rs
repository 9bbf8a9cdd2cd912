//! Error types for identity derivation.

/// Result type alias for identity operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while deriving an identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The seed was empty or too long.
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// A public identity string was not a well-formed x-only key.
    #[error("Invalid public identity: {0}")]
    InvalidPublicId(String),
}

//! Deterministic identity derivation.
//!
//! Turns an arbitrary seed (a session token, a user id) into a stable
//! secp256k1 keypair. The public half is exposed as a [`PublicId`], the
//! lower-case hex of the 32-byte x-only (BIP-340) key.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_identity::derive;
//!
//! let identity = derive(b"abc123")?;
//! assert_eq!(identity.public_id().as_str().len(), 64);
//! ```

mod error;
mod identity;

pub use error::{Error, Result};
pub use identity::{DerivedIdentity, MAX_SEED_LEN, PUBLIC_ID_HEX_LEN, PublicId, derive, generate};

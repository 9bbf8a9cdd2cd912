//! Seed-to-keypair derivation on secp256k1.

use std::fmt;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{FieldBytes, PublicKey, SecretKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::error::{Error, Result};

/// Length of a [`PublicId`] in hex characters (32-byte x-only key).
pub const PUBLIC_ID_HEX_LEN: usize = 64;

/// Longest seed [`derive`] accepts, in bytes.
pub const MAX_SEED_LEN: usize = 4096;

/// SEC1 tag for an even-y compressed point, used to lift an x-only key.
const EVEN_Y_TAG: u8 = 0x02;

/// Domain tag mixed into every re-hash after an out-of-range candidate.
const RETRY_DOMAIN: &[u8] = b"warden/identity/v1/retry";

// ─────────────────────────────────────────────────────────────────────────────
// Public identity
// ─────────────────────────────────────────────────────────────────────────────

/// Hex-encoded x-only (BIP-340) public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicId(String);

impl PublicId {
    fn from_public_key(key: &PublicKey) -> Self {
        let point = key.to_encoded_point(true);
        Self(hex::encode(&point.as_bytes()[1..]))
    }

    /// Parse and validate a public identity string.
    ///
    /// Accepts upper or lower case hex and normalizes to lower case.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != PUBLIC_ID_HEX_LEN {
            return Err(Error::InvalidPublicId(format!(
                "expected {} hex characters, got {}",
                PUBLIC_ID_HEX_LEN,
                s.len()
            )));
        }
        let mut sec1 = [0u8; 33];
        sec1[0] = EVEN_Y_TAG;
        hex::decode_to_slice(s, &mut sec1[1..])
            .map_err(|e| Error::InvalidPublicId(e.to_string()))?;
        let key = PublicKey::from_sec1_bytes(&sec1).map_err(|_| {
            Error::InvalidPublicId("not an x-coordinate on secp256k1".to_string())
        })?;
        Ok(Self::from_public_key(&key))
    }

    /// Borrow the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PublicId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<PublicId> for String {
    fn from(id: PublicId) -> Self {
        id.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Derived identity
// ─────────────────────────────────────────────────────────────────────────────

/// A keypair together with its public identity.
///
/// The secret scalar is zeroized on drop and never shown by `Debug`.
#[derive(Clone)]
pub struct DerivedIdentity {
    secret: SecretKey,
    public_id: PublicId,
}

impl DerivedIdentity {
    fn from_secret(secret: SecretKey) -> Self {
        let public_id = PublicId::from_public_key(&secret.public_key());
        Self { secret, public_id }
    }

    /// The public identity.
    pub fn public_id(&self) -> &PublicId {
        &self.public_id
    }

    /// Consume into the public identity, dropping the secret.
    pub fn into_public_id(self) -> PublicId {
        self.public_id
    }

    /// The 32-byte big-endian secret scalar.
    pub fn secret_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// The secret scalar as lower-case hex.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }
}

impl fmt::Debug for DerivedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedIdentity")
            .field("secret", &"<redacted>")
            .field("public_id", &self.public_id)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Derivation
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministically derive an identity from `seed`.
///
/// The seed is hashed with SHA-256. If the digest is zero or not below the
/// group order it is re-hashed together with a domain tag and an attempt
/// counter until a valid scalar comes out. The same seed always yields the
/// same keypair.
///
/// # Errors
///
/// Returns [`Error::InvalidSeed`] if `seed` is empty or longer than
/// [`MAX_SEED_LEN`].
pub fn derive(seed: impl AsRef<[u8]>) -> Result<DerivedIdentity> {
    let seed = seed.as_ref();
    if seed.is_empty() {
        return Err(Error::InvalidSeed("seed must not be empty".to_string()));
    }
    if seed.len() > MAX_SEED_LEN {
        return Err(Error::InvalidSeed(format!(
            "seed is {} bytes, limit is {}",
            seed.len(),
            MAX_SEED_LEN
        )));
    }

    let mut candidate: [u8; 32] = Sha256::digest(seed).into();
    let mut attempt: u32 = 0;
    loop {
        if let Ok(secret) = SecretKey::from_bytes(&FieldBytes::clone_from_slice(&candidate)) {
            return Ok(DerivedIdentity::from_secret(secret));
        }

        attempt = attempt.wrapping_add(1);
        trace!(attempt, "Scalar candidate out of range, re-hashing");
        candidate = Sha256::new()
            .chain_update(RETRY_DOMAIN)
            .chain_update(attempt.to_be_bytes())
            .chain_update(candidate)
            .finalize()
            .into();
    }
}

/// Generate a fresh random identity from the OS RNG.
pub fn generate() -> DerivedIdentity {
    DerivedIdentity::from_secret(SecretKey::random(&mut OsRng))
}

//! Session cache keyed by opaque tokens.
//!
//! This crate provides the session store behind the Warden interceptor:
//! - Atomic get-or-create, so a token maps to exactly one session
//! - A public identity derived once per session from its token
//! - A periodic background sweep that evicts idle sessions
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_session::{SessionCache, SessionConfig};
//!
//! let config = SessionConfig::default()
//!     .with_retention(Duration::from_secs(3600))
//!     .with_sweep_interval(Duration::from_secs(1800));
//!
//! let cache = SessionCache::new(config);
//! let session = cache.resolve("abc123")?;
//! ```

mod cache;
mod config;
mod error;
mod sweeper;

pub use cache::{CacheStats, Session, SessionCache};
pub use config::{DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL, SessionConfig};
pub use error::{Error, Result};

//! Session cache with atomic get-or-create and idle eviction.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use warden_identity::PublicId;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::sweeper::SweepTask;

/// State for one authenticated caller.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    public_id: PublicId,
    created_at: Instant,
    last_seen: Instant,
}

impl Session {
    fn new(token: &str, public_id: PublicId, now: Instant) -> Self {
        Self {
            token: token.to_string(),
            public_id,
            created_at: now,
            last_seen: now,
        }
    }

    /// The cache key this session was created for.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Public identity derived from the token.
    pub fn public_id(&self) -> &PublicId {
        &self.public_id
    }

    /// When the session was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the session was last resolved.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Time since the session was last resolved.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }
}

/// Shared state behind every [`SessionCache`] handle.
pub(crate) struct CacheInner {
    sessions: DashMap<String, Session>,
    config: SessionConfig,
    created: AtomicU64,
    evicted: AtomicU64,
    sweeps: AtomicU64,
    sweeper: Mutex<Option<SweepTask>>,
}

impl CacheInner {
    /// Remove every session idle for longer than the retention window,
    /// measured against `now`.
    ///
    /// Shards are locked one at a time, so `resolve` on other shards is never
    /// blocked for the whole pass.
    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let retention = self.config.retention;
        let mut evicted = 0usize;

        self.sessions
            .retain(|token, session| match now.checked_duration_since(session.last_seen) {
                Some(idle) if idle > retention => {
                    debug!(
                        public_id = %session.public_id,
                        idle_secs = idle.as_secs(),
                        "Evicting idle session"
                    );
                    evicted += 1;
                    false
                }
                Some(_) => true,
                None => {
                    // Touched after this sweep started.
                    trace!(token_len = token.len(), "Session refreshed during sweep");
                    true
                }
            });

        self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        self.sweeps.fetch_add(1, Ordering::Relaxed);

        if evicted > 0 {
            debug!(
                count = evicted,
                remaining = self.sessions.len(),
                "Swept idle sessions"
            );
        }

        evicted
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.cancel();
        }
    }
}

/// Concurrent session cache.
///
/// This cache provides:
/// - Exactly one [`Session`] per token, created on first resolution
/// - A `last_seen` refresh on every later resolution
/// - Idle eviction by a periodic sweep (never by the request path)
///
/// Handles are cheap to clone and share the same underlying map.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<CacheInner>,
}

impl SessionCache {
    /// Create a new session cache.
    ///
    /// If `enable_sweep_task` is set and a tokio runtime is available, the
    /// periodic sweep is started here and runs until [`shutdown`] is called
    /// or the last handle is dropped.
    ///
    /// [`shutdown`]: SessionCache::shutdown
    pub fn new(config: SessionConfig) -> Self {
        let inner = Arc::new(CacheInner {
            sessions: DashMap::new(),
            config,
            created: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        });

        if inner.config.enable_sweep_task {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let task = SweepTask::spawn(
                        &runtime,
                        Arc::downgrade(&inner),
                        inner.config.sweep_interval,
                    );
                    *inner.sweeper.lock() = Some(task);
                }
                Err(_) => {
                    warn!("No tokio runtime available; session sweep task not started");
                }
            }
        }

        Self { inner }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Get or create the session for `token`.
    ///
    /// On a miss the public identity is derived from the token and the
    /// session is inserted; concurrent first calls for the same token all
    /// observe that single session. On a hit `last_seen` is refreshed.
    ///
    /// # Errors
    ///
    /// Fails if identity derivation fails (empty or oversized token); nothing
    /// is inserted.
    pub fn resolve(&self, token: &str) -> Result<Session> {
        let now = Instant::now();

        if let Some(mut session) = self.inner.sessions.get_mut(token) {
            session.last_seen = now;
            trace!(public_id = %session.public_id, "Session found in cache");
            return Ok(session.value().clone());
        }

        // Derive outside the shard lock; the result is dropped if another
        // first call inserts before us.
        let public_id = warden_identity::derive(token)?.into_public_id();

        match self.inner.sessions.entry(token.to_string()) {
            Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                session.last_seen = now;
                Ok(session.clone())
            }
            Entry::Vacant(entry) => {
                let session = Session::new(token, public_id, now);
                entry.insert(session.clone());
                self.inner.created.fetch_add(1, Ordering::Relaxed);

                info!(public_id = %session.public_id, "New session");
                Ok(session)
            }
        }
    }

    /// Remove every session idle for longer than the retention window.
    ///
    /// Called automatically by the sweep task, but can also be called
    /// manually. Returns the number of sessions removed.
    pub fn sweep(&self) -> usize {
        self.inner.sweep_at(Instant::now())
    }

    /// Stop the background sweep task, if one is running.
    pub async fn shutdown(&self) {
        let task = self.inner.sweeper.lock().take();
        if let Some(task) = task {
            task.stop().await;
        }
    }

    /// Whether the background sweep task is running.
    pub fn is_sweeping(&self) -> bool {
        self.inner.sweeper.lock().is_some()
    }

    /// Get the current number of sessions.
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Check if a session exists for `token` (without refreshing it).
    pub fn contains(&self, token: &str) -> bool {
        self.inner.sessions.contains_key(token)
    }

    /// Snapshot the session for `token` without refreshing `last_seen`.
    pub fn peek(&self, token: &str) -> Option<Session> {
        self.inner.sessions.get(token).map(|s| s.value().clone())
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.inner.sessions.len(),
            created: self.inner.created.load(Ordering::Relaxed),
            evicted: self.inner.evicted.load(Ordering::Relaxed),
            sweeps: self.inner.sweeps.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("config", &self.inner.config)
            .field("size", &self.inner.sessions.len())
            .finish()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of sessions.
    pub size: usize,

    /// Sessions created since construction.
    pub created: u64,

    /// Sessions removed by sweeps since construction.
    pub evicted: u64,

    /// Sweep passes run since construction.
    pub sweeps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashSet;

    fn manual_config() -> SessionConfig {
        SessionConfig::new().with_sweep_task(false)
    }

    #[tokio::test]
    async fn test_resolve_creates_then_reuses() {
        let cache = SessionCache::new(manual_config());

        let first = cache.resolve("abc123").unwrap();
        let second = cache.resolve("abc123").unwrap();

        assert_eq!(first.public_id(), second.public_id());
        assert_eq!(first.token(), "abc123");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().created, 1);
    }

    #[tokio::test]
    async fn test_identity_is_derived_from_token() {
        let cache = SessionCache::new(manual_config());

        let session = cache.resolve("abc123").unwrap();
        let expected = warden_identity::derive("abc123").unwrap();

        assert_eq!(session.public_id(), expected.public_id());
    }

    #[tokio::test]
    async fn test_distinct_tokens_get_distinct_sessions() {
        let cache = SessionCache::new(manual_config());

        let a = cache.resolve("token-a").unwrap();
        let b = cache.resolve("token-b").unwrap();

        assert_ne!(a.public_id(), b.public_id());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_token_fails_without_insert() {
        let cache = SessionCache::new(manual_config());

        let result = cache.resolve("");
        assert!(matches!(result, Err(Error::Identity(_))));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().created, 0);
    }

    #[tokio::test]
    async fn test_oversized_token_fails_without_insert() {
        let cache = SessionCache::new(manual_config());
        let token = "a".repeat(warden_identity::MAX_SEED_LEN + 1);

        assert!(matches!(cache.resolve(&token), Err(Error::Identity(_))));
        assert!(!cache.contains(&token));
        assert_eq!(cache.stats().created, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_refreshes_last_seen() {
        let cache = SessionCache::new(manual_config());

        let first = cache.resolve("abc123").unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        let second = cache.resolve("abc123").unwrap();

        assert_eq!(second.last_seen() - first.last_seen(), Duration::from_secs(10));
        assert_eq!(second.created_at(), first.created_at());
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_does_not_refresh() {
        let cache = SessionCache::new(manual_config());

        let created = cache.resolve("abc123").unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        let peeked = cache.peek("abc123").unwrap();
        assert_eq!(peeked.last_seen(), created.last_seen());
        assert_eq!(peeked.idle_for(), Duration::from_secs(10));
        assert!(cache.contains("abc123"));
        assert!(cache.peek("missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_only_idle_sessions() {
        let retention = Duration::from_secs(3600);
        let cache = SessionCache::new(manual_config().with_retention(retention));

        cache.resolve("stale").unwrap();
        tokio::time::advance(retention - Duration::from_secs(1)).await;
        cache.resolve("fresh").unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        let evicted = cache.sweep();

        assert_eq!(evicted, 1);
        assert!(!cache.contains("stale"));
        assert!(cache.contains("fresh"));

        let stats = cache.stats();
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.sweeps, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_at_exact_retention_survives() {
        let retention = Duration::from_secs(60);
        let cache = SessionCache::new(manual_config().with_retention(retention));

        cache.resolve("edge").unwrap();
        tokio::time::advance(retention).await;

        assert_eq!(cache.sweep(), 0);
        assert!(cache.contains("edge"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_swept_token_recreates_same_identity() {
        let retention = Duration::from_secs(60);
        let cache = SessionCache::new(manual_config().with_retention(retention));

        let before = cache.resolve("abc123").unwrap();
        tokio::time::advance(retention * 2).await;
        cache.sweep();
        let after = cache.resolve("abc123").unwrap();

        assert_eq!(before.public_id(), after.public_id());
        assert_eq!(cache.stats().created, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_task() {
        let config = SessionConfig::new()
            .with_retention(Duration::from_secs(5))
            .with_sweep_interval(Duration::from_secs(10));
        let cache = SessionCache::new(config);
        assert!(cache.is_sweeping());

        cache.resolve("abc123").unwrap();
        tokio::time::sleep(Duration::from_secs(16)).await;

        assert!(cache.is_empty());
        assert!(cache.stats().sweeps >= 1);

        cache.shutdown().await;
        assert!(!cache.is_sweeping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweeping() {
        let config = SessionConfig::new()
            .with_retention(Duration::from_secs(5))
            .with_sweep_interval(Duration::from_secs(10));
        let cache = SessionCache::new(config);

        cache.shutdown().await;
        cache.resolve("abc123").unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(cache.contains("abc123"));
        assert_eq!(cache.stats().sweeps, 0);
    }

    #[test]
    fn test_no_runtime_skips_sweep_task() {
        let cache = SessionCache::new(SessionConfig::default());
        assert!(!cache.is_sweeping());
        assert!(cache.resolve("abc123").is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_first_resolution_creates_one_session() {
        let cache = SessionCache::new(manual_config());
        let barrier = Arc::new(tokio::sync::Barrier::new(64));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let cache = cache.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                cache.resolve("shared-token").unwrap().public_id().clone()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().created, 1);
    }

    #[test]
    fn test_concurrent_resolution_across_threads() {
        let cache = SessionCache::new(manual_config());
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    // Half the threads race on one token, the rest on their own.
                    let token = if i % 2 == 0 {
                        "shared".to_string()
                    } else {
                        format!("own-{}", i)
                    };
                    cache.resolve(&token).unwrap().public_id().clone()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 9);
        assert_eq!(cache.stats().created, 9);
    }
}

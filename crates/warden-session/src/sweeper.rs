//! Periodic background sweep of idle sessions.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::CacheInner;

/// Handle to a running sweep task.
pub(crate) struct SweepTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Spawn the sweep loop on `runtime`.
    ///
    /// The task only holds a weak reference to the cache, so it winds down
    /// on its own once the last cache handle is dropped.
    pub(crate) fn spawn(runtime: &Handle, cache: Weak<CacheInner>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = cache.upgrade() else {
                            break;
                        };
                        inner.sweep_at(Instant::now());
                    }
                }
            }

            debug!("Session sweeper stopped");
        });

        debug!(interval_secs = interval.as_secs(), "Session sweeper started");
        Self { cancel, handle }
    }

    /// Signal the task to stop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Signal the task to stop and wait for it to finish.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Session sweeper task ended abnormally");
        }
    }
}

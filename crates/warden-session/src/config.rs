//! Configuration for the session cache.

use std::time::Duration;

/// Default retention window: sessions idle longer than this are swept (1 hour).
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Default interval between background sweeps (30 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Configuration for the session cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a session may stay idle before the sweep removes it.
    pub retention: Duration,

    /// Interval for the sweep task.
    pub sweep_interval: Duration,

    /// Whether to spawn the periodic sweep task on construction.
    /// If false, expired sessions are only removed by calling `sweep()`.
    pub enable_sweep_task: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            enable_sweep_task: true,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retention window.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enable or disable the background sweep task.
    pub fn with_sweep_task(mut self, enabled: bool) -> Self {
        self.enable_sweep_task = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(1800));
        assert!(config.enable_sweep_task);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .with_retention(Duration::from_secs(5))
            .with_sweep_interval(Duration::from_secs(1))
            .with_sweep_task(false);

        assert_eq!(config.retention, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert!(!config.enable_sweep_task);
    }
}

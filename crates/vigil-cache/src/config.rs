//! Configuration for the result cache.

use std::time::Duration;

/// Default maximum number of entries.
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Default time-to-live for entries set without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Configuration for a [`Cache`](crate::Cache) instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name used in log lines (e.g. `response`, `retrieval`).
    pub name: String,

    /// Maximum number of entries before LRU eviction. Values below 1 are
    /// treated as 1.
    pub max_size: usize,

    /// TTL applied by [`Cache::set`](crate::Cache::set). `Duration::ZERO`
    /// means entries never expire.
    pub default_ttl: Duration,

    /// Interval for the background cleanup task, when one is spawned.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "cache".to_string(),
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: DEFAULT_TTL,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum number of entries.
    pub fn with_max_size(mut self, max: usize) -> Self {
        self.max_size = max;
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Entries set without a TTL never expire.
    pub fn without_ttl(mut self) -> Self {
        self.default_ttl = Duration::ZERO;
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Capacity actually enforced.
    pub(crate) fn effective_max_size(&self) -> usize {
        self.max_size.max(1)
    }
}

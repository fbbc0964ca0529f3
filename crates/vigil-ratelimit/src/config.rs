//! Rate limiter configuration.

use std::time::Duration;

/// Configuration for [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Requests admitted per minute.
    pub requests_per_minute: u32,

    /// Requests admitted per hour.
    pub requests_per_hour: u32,

    /// Estimated generation tokens admitted per minute.
    pub tokens_per_minute: u32,

    /// Bucket capacity as a multiple of each tier's quota.
    pub burst_multiplier: f64,

    /// Token estimate charged for a request when the caller has none.
    pub default_estimated_tokens: u32,

    /// How long `acquire` may wait across all tiers.
    pub acquire_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1000,
            tokens_per_minute: 90_000,
            burst_multiplier: 1.5,
            default_estimated_tokens: 1000,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl RateLimitConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set requests per minute.
    pub fn with_requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = rpm;
        self
    }

    /// Set requests per hour.
    pub fn with_requests_per_hour(mut self, rph: u32) -> Self {
        self.requests_per_hour = rph;
        self
    }

    /// Set tokens per minute.
    pub fn with_tokens_per_minute(mut self, tpm: u32) -> Self {
        self.tokens_per_minute = tpm;
        self
    }

    /// Set the burst multiplier.
    pub fn with_burst_multiplier(mut self, burst: f64) -> Self {
        self.burst_multiplier = burst;
        self
    }

    /// Set the default per-request token estimate.
    pub fn with_default_estimated_tokens(mut self, tokens: u32) -> Self {
        self.default_estimated_tokens = tokens;
        self
    }

    /// Set the acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

//! Three-tier admission control.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bucket::TokenBucket;
use crate::config::RateLimitConfig;
use crate::error::{LimitTier, RateLimitExceeded};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Proof that a request was admitted.
///
/// Hand it back to [`RateLimiter::reconcile`] once the real token usage is
/// known. Consuming the permit means each request is reconciled at most once.
#[derive(Debug)]
#[must_use = "reconcile the permit once actual token usage is known"]
pub struct RateLimitPermit {
    estimated_tokens: u64,
}

impl RateLimitPermit {
    /// Tokens charged when the permit was granted.
    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }
}

#[derive(Debug, Default)]
struct LimiterCounters {
    total_requests: u64,
    total_tokens: u64,
    blocked_requests: u64,
    blocked_by_tier: BTreeMap<LimitTier, u64>,
}

/// Admission control over requests/minute, requests/hour and tokens/minute.
///
/// Each tier is a [`TokenBucket`] whose capacity is its quota times the
/// burst multiplier. A request must be granted by all three, in that order.
/// The first refusal short-circuits; tokens already taken from earlier tiers
/// are not returned.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    requests_per_minute: TokenBucket,
    requests_per_hour: TokenBucket,
    tokens_per_minute: TokenBucket,
    counters: Mutex<LimiterCounters>,
}

impl RateLimiter {
    /// Create a limiter with full buckets.
    pub fn new(config: RateLimitConfig) -> Self {
        let burst = config.burst_multiplier;
        Self {
            requests_per_minute: TokenBucket::per_window(config.requests_per_minute, MINUTE, burst),
            requests_per_hour: TokenBucket::per_window(config.requests_per_hour, HOUR, burst),
            tokens_per_minute: TokenBucket::per_window(config.tokens_per_minute, MINUTE, burst),
            counters: Mutex::new(LimiterCounters::default()),
            config,
        }
    }

    /// Get the limiter configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn bucket(&self, tier: LimitTier) -> &TokenBucket {
        match tier {
            LimitTier::RequestsPerMinute => &self.requests_per_minute,
            LimitTier::RequestsPerHour => &self.requests_per_hour,
            LimitTier::TokensPerMinute => &self.tokens_per_minute,
        }
    }

    /// Admit one request expected to use `estimated_tokens`.
    ///
    /// Waits up to `timeout` (the configured acquire timeout when `None`)
    /// across all tiers combined.
    pub async fn acquire(
        &self,
        estimated_tokens: u32,
        timeout: Option<Duration>,
    ) -> Result<RateLimitPermit, RateLimitExceeded> {
        let timeout = timeout.unwrap_or(self.config.acquire_timeout);
        let deadline = Instant::now().checked_add(timeout);

        for tier in LimitTier::ALL {
            let cost = match tier {
                LimitTier::TokensPerMinute => f64::from(estimated_tokens),
                _ => 1.0,
            };
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));

            if !self.bucket(tier).acquire(cost, true, remaining).await {
                let mut counters = self.counters.lock();
                counters.blocked_requests += 1;
                *counters.blocked_by_tier.entry(tier).or_default() += 1;
                drop(counters);

                warn!(
                    tier = %tier,
                    estimated_tokens = estimated_tokens,
                    "Rate limit exceeded"
                );
                return Err(RateLimitExceeded { tier });
            }
        }

        let mut counters = self.counters.lock();
        counters.total_requests += 1;
        counters.total_tokens += u64::from(estimated_tokens);
        debug!(
            estimated_tokens = estimated_tokens,
            total_requests = counters.total_requests,
            "Request admitted"
        );

        Ok(RateLimitPermit {
            estimated_tokens: u64::from(estimated_tokens),
        })
    }

    /// Admit one request with the configured default token estimate.
    pub async fn acquire_default(&self) -> Result<RateLimitPermit, RateLimitExceeded> {
        self.acquire(self.config.default_estimated_tokens, None).await
    }

    /// Replace a permit's estimate with the tokens actually used.
    ///
    /// The running total moves by this request's own delta, so it can never
    /// drop below the sum of actual usage. Usage above the estimate is also
    /// drained from the tokens/minute bucket.
    pub fn reconcile(&self, permit: RateLimitPermit, actual_tokens: u64) {
        let estimated = permit.estimated_tokens;

        {
            let mut counters = self.counters.lock();
            counters.total_tokens = counters
                .total_tokens
                .saturating_sub(estimated)
                .saturating_add(actual_tokens);
        }

        if actual_tokens > estimated {
            let excess = (actual_tokens - estimated) as f64;
            let drained = self.tokens_per_minute.drain(excess);
            debug!(
                estimated = estimated,
                actual = actual_tokens,
                drained = drained,
                "Token usage above estimate"
            );
        }
    }

    /// Get limiter statistics.
    pub fn stats(&self) -> RateLimiterStats {
        let counters = self.counters.lock();
        RateLimiterStats {
            total_requests: counters.total_requests,
            total_tokens: counters.total_tokens,
            blocked_requests: counters.blocked_requests,
            blocked_by_tier: counters
                .blocked_by_tier
                .iter()
                .map(|(tier, count)| (tier.as_str().to_string(), *count))
                .collect(),
            available_requests_per_minute: self.requests_per_minute.available(),
            available_requests_per_hour: self.requests_per_hour.available(),
            available_tokens_per_minute: self.tokens_per_minute.available(),
        }
    }
}

/// Rate limiter statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    /// Requests admitted.
    pub total_requests: u64,
    /// Tokens charged for admitted requests, reconciled where reported.
    pub total_tokens: u64,
    /// Requests refused.
    pub blocked_requests: u64,
    /// Refusals per tier name.
    pub blocked_by_tier: BTreeMap<String, u64>,
    /// Tokens left in the requests/minute bucket.
    pub available_requests_per_minute: f64,
    /// Tokens left in the requests/hour bucket.
    pub available_requests_per_hour: f64,
    /// Tokens left in the tokens/minute bucket.
    pub available_tokens_per_minute: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const NO_WAIT: Option<Duration> = Some(Duration::ZERO);

    fn limiter(rpm: u32, rph: u32, tpm: u32) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig::new()
                .with_requests_per_minute(rpm)
                .with_requests_per_hour(rph)
                .with_tokens_per_minute(tpm)
                .with_burst_multiplier(1.0),
        )
    }

    #[tokio::test]
    async fn test_admits_within_all_tiers() {
        let limiter = limiter(10, 100, 10_000);
        let permit = limiter.acquire(500, NO_WAIT).await.unwrap();
        assert_eq!(permit.estimated_tokens(), 500);

        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.total_tokens, 500);
        assert_eq!(stats.blocked_requests, 0);
        limiter.reconcile(permit, 500);
    }

    #[tokio::test]
    async fn test_requests_per_minute_refuses_first() {
        let limiter = limiter(2, 100, 10_000);
        let _a = limiter.acquire(1, NO_WAIT).await.unwrap();
        let _b = limiter.acquire(1, NO_WAIT).await.unwrap();

        let err = limiter.acquire(1, NO_WAIT).await.unwrap_err();
        assert_eq!(err.tier, LimitTier::RequestsPerMinute);

        let stats = limiter.stats();
        assert_eq!(stats.blocked_requests, 1);
        assert_eq!(stats.blocked_by_tier["requests_per_minute"], 1);
    }

    #[tokio::test]
    async fn test_requests_per_hour_refuses() {
        let limiter = limiter(100, 1, 10_000);
        let _a = limiter.acquire(1, NO_WAIT).await.unwrap();
        let err = limiter.acquire(1, NO_WAIT).await.unwrap_err();
        assert_eq!(err.tier, LimitTier::RequestsPerHour);
    }

    #[tokio::test]
    async fn test_token_tier_refusal_keeps_earlier_consumption() {
        let limiter = limiter(10, 100, 1000);
        let rpm_before = limiter.stats().available_requests_per_minute;

        let err = limiter.acquire(5000, NO_WAIT).await.unwrap_err();
        assert_eq!(err.tier, LimitTier::TokensPerMinute);

        // No rollback: the request slot taken before the refusal stays taken.
        let rpm_after = limiter.stats().available_requests_per_minute;
        assert!(rpm_before - rpm_after > 0.9);
        assert_eq!(limiter.stats().total_requests, 0);
    }

    #[tokio::test]
    async fn test_blocking_acquire_times_out() {
        let limiter = limiter(1, 100, 10_000);
        let _a = limiter.acquire(1, NO_WAIT).await.unwrap();

        let start = Instant::now();
        let result = limiter.acquire(1, Some(Duration::from_millis(120))).await;
        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_millis(120));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_reconcile_replaces_estimate() {
        let limiter = limiter(10, 100, 10_000);
        let permit = limiter.acquire(1000, NO_WAIT).await.unwrap();
        limiter.reconcile(permit, 120);
        assert_eq!(limiter.stats().total_tokens, 120);
    }

    #[tokio::test]
    async fn test_reconcile_excess_drains_token_bucket() {
        let limiter = limiter(10, 100, 10_000);
        let permit = limiter.acquire(100, NO_WAIT).await.unwrap();
        let before = limiter.stats().available_tokens_per_minute;

        limiter.reconcile(permit, 2100);

        let after = limiter.stats().available_tokens_per_minute;
        assert!(before - after > 1990.0, "before {before} after {after}");
        assert_eq!(limiter.stats().total_tokens, 2100);
    }

    #[tokio::test]
    async fn test_concurrent_reconcile_never_negative() {
        let limiter = Arc::new(limiter(1000, 1000, 1_000_000));
        let mut handles = Vec::new();
        for i in 0..20u64 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let permit = limiter.acquire(1000, NO_WAIT).await.unwrap();
                tokio::task::yield_now().await;
                limiter.reconcile(permit, i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 20);
        assert_eq!(stats.total_tokens, (0..20).sum::<u64>());
    }

    #[tokio::test]
    async fn test_default_estimate() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let permit = limiter.acquire_default().await.unwrap();
        assert_eq!(permit.estimated_tokens(), 1000);
        limiter.reconcile(permit, 1000);
    }

    #[tokio::test]
    async fn test_huge_timeout_does_not_overflow() {
        let limiter = limiter(10, 100, 10_000);
        let timeout = Some(Duration::from_secs(u64::MAX));
        let permit = limiter.acquire(100, timeout).await.unwrap();
        limiter.reconcile(permit, 100);
    }

    #[test]
    fn test_default_capacities() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let stats = limiter.stats();
        assert!((stats.available_requests_per_minute - 90.0).abs() < 1e-6);
        assert!((stats.available_requests_per_hour - 1500.0).abs() < 1e-6);
        assert!((stats.available_tokens_per_minute - 135_000.0).abs() < 1e-3);
    }
}

//! Multi-tier token bucket admission control.
//!
//! A [`RateLimiter`] is built once at process start and shared by every
//! request. Admission yields a [`RateLimitPermit`] that is later reconciled
//! against the tokens the request really used.

mod bucket;
mod config;
mod error;
mod limiter;

pub use bucket::TokenBucket;
pub use config::RateLimitConfig;
pub use error::{LimitTier, RateLimitExceeded};
pub use limiter::{RateLimitPermit, RateLimiter, RateLimiterStats};

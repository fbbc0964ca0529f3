//! Rate limiter errors.

use serde::Serialize;
use thiserror::Error;

/// The three admission tiers, checked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitTier {
    /// Requests per minute.
    RequestsPerMinute,
    /// Requests per hour.
    RequestsPerHour,
    /// Tokens per minute.
    TokensPerMinute,
}

impl LimitTier {
    /// All tiers in admission order.
    pub const ALL: [LimitTier; 3] = [
        LimitTier::RequestsPerMinute,
        LimitTier::RequestsPerHour,
        LimitTier::TokensPerMinute,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestsPerMinute => "requests_per_minute",
            Self::RequestsPerHour => "requests_per_hour",
            Self::TokensPerMinute => "tokens_per_minute",
        }
    }
}

impl std::fmt::Display for LimitTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request was refused by one of the tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Rate limit exceeded: {tier}")]
pub struct RateLimitExceeded {
    /// The first tier that refused.
    pub tier: LimitTier,
}

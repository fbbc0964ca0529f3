//! Metric value types and report shapes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Latency Statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Running count/sum/min/max for one named latency metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    /// Number of samples.
    pub count: u64,
    /// Sum of all samples.
    pub total: Duration,
    /// Smallest sample.
    pub min: Duration,
    /// Largest sample.
    pub max: Duration,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self {
            count: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }
}

impl LatencyStats {
    /// Fold one sample in.
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total = self.total.saturating_add(duration);
        self.min = self.min.min(duration);
        self.max = self.max.max(duration);
    }

    /// Mean sample, zero when empty.
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Millisecond summary for reports.
    pub fn summary(&self) -> LatencySummary {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        LatencySummary {
            count: self.count,
            avg_ms: ms(self.average()),
            min_ms: if self.count == 0 { 0.0 } else { ms(self.min) },
            max_ms: ms(self.max),
        }
    }
}

/// Latency statistics in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    /// Number of samples.
    pub count: u64,
    /// Mean in milliseconds.
    pub avg_ms: f64,
    /// Minimum in milliseconds.
    pub min_ms: f64,
    /// Maximum in milliseconds.
    pub max_ms: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Samples and Errors
// ─────────────────────────────────────────────────────────────────────────────

/// One latency sample kept in the recent window.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSample {
    /// Metric name.
    pub name: String,
    /// Duration in seconds.
    pub value: f64,
    /// Wall-clock time of recording.
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied labels.
    pub labels: BTreeMap<String, String>,
    #[serde(skip)]
    pub(crate) recorded_at: Instant,
}

/// The most recent recorded error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    /// Error category (e.g. `generation`, `retrieval`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable details.
    pub details: String,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Point-in-time view of every metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    /// Seconds since start or last reset.
    pub uptime_seconds: f64,
    /// Latency statistics per metric.
    pub latencies: BTreeMap<String, LatencySummary>,
    /// Counter values.
    pub counters: BTreeMap<String, u64>,
    /// Gauge values.
    pub gauges: BTreeMap<String, f64>,
    /// Error counts per type.
    pub errors: BTreeMap<String, u64>,
    /// Most recent error.
    pub last_error: Option<ErrorRecord>,
    /// Sum of all error counts.
    pub total_errors: u64,
    /// Samples currently held in the recent window.
    pub recent_samples: usize,
}

/// Service health derived from the error rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Error rate at or below 5%.
    Healthy,
    /// Error rate above 5% and at most 10%.
    Degraded,
    /// Error rate above 10%.
    Unhealthy,
}

impl HealthState {
    /// Classify an error rate in `[0, 1]`.
    pub fn from_error_rate(error_rate: f64) -> Self {
        if error_rate > 0.10 {
            Self::Unhealthy
        } else if error_rate > 0.05 {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health report for monitoring endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    /// Classification.
    pub status: HealthState,
    /// Seconds since start or last reset.
    pub uptime_seconds: f64,
    /// `total_errors / total_requests`, 0 with no requests.
    pub error_rate: f64,
    /// Value of the `requests_total` counter.
    pub total_requests: u64,
    /// Mean of the `request` latency metric in milliseconds.
    pub avg_latency_ms: f64,
}

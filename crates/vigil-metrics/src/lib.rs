//! In-process metrics for Vigil.
//!
//! A [`MetricsCollector`] holds named counters, gauges and latency
//! statistics, a per-type error tally, and a bounded window of recent
//! latency samples. [`MetricsCollector::health_status`] turns the error rate
//! into a [`HealthState`].
//!
//! ```
//! use std::time::Duration;
//! use vigil_metrics::MetricsCollector;
//!
//! let metrics = MetricsCollector::default();
//! metrics.increment("requests_total");
//! metrics.record_latency("request", Duration::from_millis(12), &[]);
//! assert_eq!(metrics.health_status().total_requests, 1);
//! ```

pub mod collector;
pub mod types;

pub use collector::{
    DEFAULT_MAX_SAMPLES, DEFAULT_RETENTION, LatencyTimer, MetricsCollector, MetricsConfig,
    REQUEST_LATENCY, REQUESTS_TOTAL,
};
pub use types::{
    ErrorRecord, HealthState, HealthStatus, LatencyStats, LatencySummary, MetricSample,
    MetricsSummary,
};

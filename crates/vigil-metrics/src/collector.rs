//! The metrics collector.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;

use crate::types::{
    ErrorRecord, HealthState, HealthStatus, LatencyStats, LatencySummary, MetricSample,
    MetricsSummary,
};

/// Default cap on samples held in the recent window.
pub const DEFAULT_MAX_SAMPLES: usize = 10_000;

/// Default age after which samples leave the recent window.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Counter read by [`MetricsCollector::health_status`] for the request total.
pub const REQUESTS_TOTAL: &str = "requests_total";

/// Latency metric read by [`MetricsCollector::health_status`].
pub const REQUEST_LATENCY: &str = "request";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Sample window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Maximum samples in the recent window.
    pub max_samples: usize,
    /// Maximum sample age.
    pub retention: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            retention: DEFAULT_RETENTION,
        }
    }
}

impl MetricsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collector
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct MetricsInner {
    latencies: BTreeMap<String, LatencyStats>,
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, f64>,
    errors: BTreeMap<String, u64>,
    last_error: Option<ErrorRecord>,
    samples: VecDeque<MetricSample>,
    started_at: Instant,
}

impl MetricsInner {
    fn new() -> Self {
        Self {
            latencies: BTreeMap::new(),
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
            errors: BTreeMap::new(),
            last_error: None,
            samples: VecDeque::new(),
            started_at: Instant::now(),
        }
    }

    fn prune(&mut self, now: Instant, config: &MetricsConfig) {
        while self
            .samples
            .front()
            .is_some_and(|s| now.saturating_duration_since(s.recorded_at) > config.retention)
        {
            self.samples.pop_front();
        }
        while self.samples.len() > config.max_samples {
            self.samples.pop_front();
        }
    }

    fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }
}

/// Thread-safe store of counters, gauges, latency statistics and errors.
///
/// Cheap to clone; clones share state. Every write happens under one lock,
/// so concurrent increments are never lost.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    config: MetricsConfig,
    inner: Arc<Mutex<MetricsInner>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl MetricsCollector {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(MetricsInner::new())),
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Record one latency sample under `name`.
    ///
    /// Updates the running statistics and appends a labelled sample to the
    /// recent window, pruning it by age and size.
    pub fn record_latency(&self, name: &str, duration: Duration, labels: &[(&str, &str)]) {
        let mut sample_labels = BTreeMap::new();
        sample_labels.insert("metric".to_string(), name.to_string());
        for (key, value) in labels {
            sample_labels.insert((*key).to_string(), (*value).to_string());
        }

        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner
            .latencies
            .entry(name.to_string())
            .or_default()
            .record(duration);
        inner.samples.push_back(MetricSample {
            name: name.to_string(),
            value: duration.as_secs_f64(),
            timestamp: Utc::now(),
            labels: sample_labels,
            recorded_at: now,
        });
        inner.prune(now, &self.config);
    }

    /// Add `delta` to a counter, creating it at zero.
    pub fn increment_counter(&self, name: &str, delta: u64) {
        let mut inner = self.inner.lock();
        let counter = inner.counters.entry(name.to_string()).or_default();
        *counter = counter.saturating_add(delta);
    }

    /// Add one to a counter.
    pub fn increment(&self, name: &str) {
        self.increment_counter(name, 1);
    }

    /// Set a gauge to `value`.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.inner.lock().gauges.insert(name.to_string(), value);
    }

    /// Count an error of `kind` and remember it as the most recent.
    pub fn record_error(&self, kind: &str, details: &str) {
        {
            let mut inner = self.inner.lock();
            *inner.errors.entry(kind.to_string()).or_default() += 1;
            inner.last_error = Some(ErrorRecord {
                kind: kind.to_string(),
                details: details.to_string(),
                timestamp: Utc::now(),
            });
        }
        tracing::error!(kind = kind, details = details, "Recorded error");
    }

    /// Current value of a counter, zero if never incremented.
    pub fn counter(&self, name: &str) -> u64 {
        self.inner.lock().counters.get(name).copied().unwrap_or(0)
    }

    /// Current value of a gauge.
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.inner.lock().gauges.get(name).copied()
    }

    /// Latency statistics for a metric.
    pub fn latency(&self, name: &str) -> Option<LatencyStats> {
        self.inner.lock().latencies.get(name).copied()
    }

    /// Count of errors of `kind`.
    pub fn error_count(&self, kind: &str) -> u64 {
        self.inner.lock().errors.get(kind).copied().unwrap_or(0)
    }

    /// Sum of all error counts.
    pub fn total_errors(&self) -> u64 {
        self.inner.lock().total_errors()
    }

    /// Samples currently held in the recent window.
    pub fn recent_samples(&self) -> Vec<MetricSample> {
        self.inner.lock().samples.iter().cloned().collect()
    }

    /// Start timing `name`; the sample is recorded when the timer drops.
    pub fn start_timer(&self, name: &str) -> LatencyTimer {
        LatencyTimer {
            collector: self.clone(),
            name: name.to_string(),
            labels: Vec::new(),
            started: Instant::now(),
            recorded: false,
        }
    }

    /// Time an async block under `name`, recording success or failure alike.
    pub async fn time<F, T>(&self, name: &str, fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let _timer = self.start_timer(name);
        fut.await
    }

    /// Snapshot of every metric.
    pub fn summary(&self) -> MetricsSummary {
        let inner = self.inner.lock();
        MetricsSummary {
            uptime_seconds: inner.started_at.elapsed().as_secs_f64(),
            latencies: inner
                .latencies
                .iter()
                .map(|(name, stats)| (name.clone(), stats.summary()))
                .collect(),
            counters: inner.counters.clone(),
            gauges: inner.gauges.clone(),
            errors: inner.errors.clone(),
            last_error: inner.last_error.clone(),
            total_errors: inner.total_errors(),
            recent_samples: inner.samples.len(),
        }
    }

    /// Health derived from the error rate over `requests_total`.
    pub fn health_status(&self) -> HealthStatus {
        let inner = self.inner.lock();
        let total_requests = inner.counters.get(REQUESTS_TOTAL).copied().unwrap_or(0);
        let total_errors = inner.total_errors();
        let error_rate = if total_requests == 0 {
            0.0
        } else {
            total_errors as f64 / total_requests as f64
        };
        let avg_latency_ms = inner
            .latencies
            .get(REQUEST_LATENCY)
            .map(LatencyStats::summary)
            .map_or(0.0, |s: LatencySummary| s.avg_ms);

        HealthStatus {
            status: HealthState::from_error_rate(error_rate),
            uptime_seconds: inner.started_at.elapsed().as_secs_f64(),
            error_rate,
            total_requests,
            avg_latency_ms,
        }
    }

    /// Clear every metric and restart the uptime clock.
    pub fn reset(&self) {
        *self.inner.lock() = MetricsInner::new();
        tracing::info!("Metrics reset");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timer
// ─────────────────────────────────────────────────────────────────────────────

/// Records elapsed time into a [`MetricsCollector`] when dropped.
///
/// Early returns and `?` still produce a sample.
#[derive(Debug)]
pub struct LatencyTimer {
    collector: MetricsCollector,
    name: String,
    labels: Vec<(String, String)>,
    started: Instant,
    recorded: bool,
}

impl LatencyTimer {
    /// Attach a label to the eventual sample.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Time since the timer started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record now and return the measured duration.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        if !self.recorded {
            self.recorded = true;
            let labels: Vec<(&str, &str)> = self
                .labels
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            self.collector.record_latency(&self.name, elapsed, &labels);
        }
        elapsed
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        self.record();
    }
}

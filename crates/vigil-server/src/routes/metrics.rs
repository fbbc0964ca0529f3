//! Metrics snapshot endpoint.

use axum::{Json, extract::State};
use serde::Serialize;
use vigil_cache::CacheStats;
use vigil_domain::MetricsSummary;
use vigil_ratelimit::RateLimiterStats;

use crate::state::AppState;

/// Everything the service counts, in one document.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub metrics: MetricsSummary,
    pub response_cache: CacheStats,
    pub retrieval_cache: CacheStats,
    pub rate_limiter: RateLimiterStats,
}

/// GET /api/v1/metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsResponse> {
    let services = state.handler.services();
    Json(MetricsResponse {
        metrics: state.handler.metrics_summary(),
        response_cache: services.response_cache.stats(),
        retrieval_cache: services.retrieval_cache.stats(),
        rate_limiter: services.rate_limiter.stats(),
    })
}

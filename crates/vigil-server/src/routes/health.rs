//! Health check endpoint.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use vigil_domain::{HealthState, HealthStatus};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub health: HealthStatus,
    /// Service version.
    pub version: String,
}

/// GET /health. Answers 503 while the error rate is unhealthy.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let health = state.handler.health_status();
    let status = match health.status {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthState::Healthy | HealthState::Degraded => StatusCode::OK,
    };

    (
        status,
        Json(HealthResponse {
            health,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

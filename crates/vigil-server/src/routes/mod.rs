//! HTTP routes.

mod ask;
mod health;
mod metrics;

pub use ask::{AskRequest, ask_handler};
pub use health::{HealthResponse, health, health_routes};
pub use metrics::{MetricsResponse, metrics_handler};

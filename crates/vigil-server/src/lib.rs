//! HTTP API server for Vigil.
//!
//! # Routes
//!
//! | Method | Path              | Body                       |
//! |--------|-------------------|----------------------------|
//! | GET    | `/health`         | health status and version  |
//! | GET    | `/api/v1/metrics` | counters, latencies, stats |
//! | POST   | `/api/v1/ask`     | `{user_id, query}` → answer|
//!
//! Errors are JSON `{code, message}`.
//!
//! # Example
//!
//! ```ignore
//! use vigil_server::{Server, ServerConfig};
//!
//! let handler = RequestHandler::new(Services::from_config(&config)?);
//! let server = Server::new(handler, ServerConfig::new());
//! server.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use logging::request_logging_middleware;
pub use routes::{AskRequest, HealthResponse, MetricsResponse};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use vigil_domain::RequestHandler;

/// The Vigil HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server around a request handler.
    pub fn new(handler: RequestHandler, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(handler, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http());

        if self.state.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.with_state(self.state.clone())
    }

    /// API routes (v1).
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route("/ask", post(routes::ask_handler))
            .route("/metrics", get(routes::metrics_handler))
    }

    /// Run the server until the process is interrupted.
    pub async fn run(self) -> Result<()> {
        self.run_with_shutdown(shutdown_signal()).await
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address;
        let router = self.router();
        let maintenance = self.state.handler.services().spawn_maintenance();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;
        info!(addr = %addr, "Starting server");

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)));

        for task in maintenance {
            task.abort();
        }
        info!("Server stopped");
        served
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

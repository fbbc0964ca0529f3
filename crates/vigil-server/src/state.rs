//! Application state shared across handlers.

use std::sync::Arc;

use vigil_domain::RequestHandler;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The request handler and the services behind it.
    pub handler: Arc<RequestHandler>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(handler: RequestHandler, config: ServerConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            config: Arc::new(config),
        }
    }
}

//! Retrieval errors.

use thiserror::Error;
use vigil_llm::Retryable;

/// Result type alias using the retrieval error type.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Error type for retrieval calls.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Network/connectivity error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// The search service answered with a server error (retryable).
    #[error("Search service unavailable: {0}")]
    Unavailable(String),

    /// The search service rejected the request.
    #[error("Search service error (HTTP {status}): {message}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Body or error message.
        message: String,
    },

    /// Response could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Retriever is misconfigured.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Returns true if another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }

    /// Short machine-readable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Unavailable(_) => "unavailable",
            Self::Backend { .. } => "backend",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
        }
    }
}

impl Retryable for RetrievalError {
    fn is_retryable(&self) -> bool {
        RetrievalError::is_retryable(self)
    }
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RetrievalError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            RetrievalError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            RetrievalError::Serialization(err.to_string())
        } else {
            RetrievalError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RetrievalError {
    fn from(err: serde_json::Error) -> Self {
        RetrievalError::Serialization(err.to_string())
    }
}

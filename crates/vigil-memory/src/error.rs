//! Error types for the memory crate.

use thiserror::Error;
use vigil_llm::Retryable;

/// Errors from a memory collaborator.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Network/connectivity error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// Memory service returned a server error (retryable).
    #[error("Memory service unavailable: {0}")]
    Unavailable(String),

    /// Memory service rejected the request.
    #[error("Memory API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Body or error message.
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Client is misconfigured.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MemoryError {
    /// Returns true if another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }
}

impl Retryable for MemoryError {
    fn is_retryable(&self) -> bool {
        MemoryError::is_retryable(self)
    }
}

impl From<reqwest::Error> for MemoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MemoryError::Serialization(err.to_string())
        } else {
            MemoryError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Serialization(err.to_string())
    }
}

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;

//! Domain error types.

use thiserror::Error;

/// Errors raised while assembling services. Request handling itself never
/// fails; see [`RequestHandler::handle`](crate::RequestHandler::handle).
#[derive(Debug, Error)]
pub enum DomainError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] vigil_config::ConfigError),

    /// Generator could not be built.
    #[error("Generator error: {0}")]
    Llm(#[from] vigil_llm::LlmError),

    /// Retriever could not be built.
    #[error("Retriever error: {0}")]
    Retrieval(#[from] vigil_retrieval::RetrievalError),

    /// Memory client could not be built.
    #[error("Memory error: {0}")]
    Memory(#[from] vigil_memory::MemoryError),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

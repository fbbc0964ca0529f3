//! Error types for the controller.

use thiserror::Error;
use vigil_llm::LlmError;
use vigil_retrieval::RetrievalError;

/// Result type alias using the controller error type.
pub type Result<T> = std::result::Result<T, ControllerError>;

/// A collaborator failure that ended a controller run.
///
/// The controller never retries; collaborators retry transient failures
/// themselves before surfacing one of these.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The generator failed.
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    /// The retriever failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

impl ControllerError {
    /// Error category for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generation",
            Self::Retrieval(_) => "retrieval",
        }
    }
}

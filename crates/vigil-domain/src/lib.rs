//! Request handling for Vigil.
//!
//! This crate sits between the transport layers (HTTP server, CLI) and the
//! infrastructure crates. It assembles the shared [`Services`] from
//! configuration and exposes [`RequestHandler`], which takes a user id and a
//! question through validation, safety screening, rate limiting, the
//! response cache and the quality controller.
//!
//! # Example
//!
//! ```ignore
//! use vigil_domain::{RequestHandler, Services};
//!
//! let services = Services::from_config(&config)?;
//! let handler = RequestHandler::new(services);
//! let reply = handler.handle("user-42", "What causes ketosis?").await;
//! ```

mod error;
pub mod handler;
pub mod safety;
pub mod services;

pub use error::{DomainError, Result};
pub use handler::{
    Answer, AnswerOutcome, AnswerScores, ERROR_RESPONSE, RATE_LIMITED_RESPONSE, RequestHandler,
};
pub use safety::{
    AllowAll, BLOCKED_RESPONSE, GuardClassifier, SafetyClassifier, SafetyVerdict,
    SharedClassifier, parse_verdict,
};
pub use services::{HandlerConfig, Services};

// Re-export key types from infrastructure crates for convenience
pub use vigil_agent::FALLBACK_RESPONSE;
pub use vigil_metrics::{HealthState, HealthStatus, MetricsSummary};

//! Quality-control controller for Vigil.
//!
//! Answers a question by expanding it into a search query, retrieving
//! context, drafting a response, and then scoring that response twice:
//! once for groundedness in the context and once for precision against the
//! question. A failing score triggers a refinement cycle; each gate is
//! capped at `max_iterations`, after which a fixed fallback answer is used.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  QualityController::run                                   │
//! │  loop { apply(step, state) ; step = next_step(step, ..) } │
//! └───────────────────────────────────────────────────────────┘
//!            │                 │                  │
//!            ▼                 ▼                  ▼
//!     ┌────────────┐    ┌────────────┐    ┌──────────────┐
//!     │ Generator  │    │ Retriever  │    │ Metrics/Cache│
//!     │(vigil-llm) │    │(retrieval) │    │              │
//!     └────────────┘    └────────────┘    └──────────────┘
//! ```

pub mod controller;
pub mod error;
pub mod prompts;
pub mod score;
pub mod state;
pub mod step;

pub use controller::{ControllerConfig, LLM_REQUESTS, QualityController, RunOutcome};
pub use error::{ControllerError, Result};
pub use prompts::{DEFAULT_DOMAIN, FALLBACK_RESPONSE};
pub use score::{FALLBACK_SCORE, parse_score};
pub use state::RequestState;
pub use step::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_THRESHOLD, RoutingPolicy, Step, Terminal, next_step,
    route_groundedness, route_precision,
};

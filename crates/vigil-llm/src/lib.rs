//! Text generation client abstraction for Vigil.
//!
//! The quality-control loop never talks to a provider directly. It holds a
//! [`SharedGenerator`] and sends [`GenerationRequest`]s: a system
//! instruction, a user template and the variables to fill it with.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Generator trait                        │
//! │  - generate(request) -> Generation      │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!   ┌──────────────┐    ┌──────────────┐
//!   │ OpenAI-compat│    │    Mock      │
//!   └──────────────┘    └──────────────┘
//! ```
//!
//! Transient failures are retried inside the generator with
//! [`with_retry`], which other outbound clients reuse.

pub mod error;
pub mod generator;
pub mod openai;
pub mod retry;
pub mod types;

pub use error::{LlmError, RateLimitInfo, Result};
pub use generator::{Generator, MockGenerator, SharedGenerator};
pub use openai::{OpenAiConfig, OpenAiGenerator, create_shared_generator};
pub use retry::{Retryable, with_retry};
pub use types::{Generation, GenerationRequest, Usage, render_template};

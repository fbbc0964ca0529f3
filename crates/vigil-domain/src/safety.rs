//! Input safety screening.
//!
//! A guard model labels each query `safe` or `unsafe` followed by a line of
//! hazard category codes (`S1`, `S2`, ...). Some categories are expected
//! for the service's subject area and are let through.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use vigil_llm::{GenerationRequest, LlmError, SharedGenerator};

/// Categories admitted by default: specialized advice and privacy.
pub const DEFAULT_ALLOWED_CATEGORIES: [&str; 2] = ["S6", "S7"];

/// Reply when a query is refused.
pub const BLOCKED_RESPONSE: &str = "I apologize, but I cannot process that input as it may be \
inappropriate. Please try again with a different question.";

/// Outcome of screening one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SafetyVerdict {
    Safe,
    Unsafe { categories: Vec<String> },
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

/// Screens user input before it reaches the controller.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SafetyVerdict, LlmError>;

    fn name(&self) -> &str;
}

pub type SharedClassifier = Arc<dyn SafetyClassifier>;

// ─────────────────────────────────────────────────────────────────────────────
// AllowAll
// ─────────────────────────────────────────────────────────────────────────────

/// Classifier used when no guard model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl SafetyClassifier for AllowAll {
    async fn classify(&self, _text: &str) -> Result<SafetyVerdict, LlmError> {
        Ok(SafetyVerdict::Safe)
    }

    fn name(&self) -> &str {
        "allow_all"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GuardClassifier
// ─────────────────────────────────────────────────────────────────────────────

/// Classifier backed by a guard model behind a [`Generator`](vigil_llm::Generator).
pub struct GuardClassifier {
    generator: SharedGenerator,
    allowed: BTreeSet<String>,
}

impl GuardClassifier {
    pub fn new(generator: SharedGenerator) -> Self {
        Self {
            generator,
            allowed: DEFAULT_ALLOWED_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }

    /// Replace the set of categories that are let through.
    pub fn with_allowed_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = categories
            .into_iter()
            .map(|c| c.into().to_ascii_uppercase())
            .collect();
        self
    }
}

#[async_trait]
impl SafetyClassifier for GuardClassifier {
    async fn classify(&self, text: &str) -> Result<SafetyVerdict, LlmError> {
        let request = GenerationRequest::new("safety", "", "{text}").with_var("text", text);
        let generation = self.generator.generate(request).await?;

        let verdict = match parse_verdict(&generation.text) {
            SafetyVerdict::Unsafe { categories }
                if !categories.is_empty()
                    && categories.iter().all(|c| self.allowed.contains(c)) =>
            {
                tracing::debug!(categories = ?categories, "Guard categories allowed");
                SafetyVerdict::Safe
            }
            verdict => verdict,
        };
        Ok(verdict)
    }

    fn name(&self) -> &str {
        "guard"
    }
}

impl std::fmt::Debug for GuardClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardClassifier")
            .field("generator", &self.generator.name())
            .field("allowed", &self.allowed)
            .finish()
    }
}

/// Parse guard output: `safe`, or `unsafe` with category codes on the
/// following lines (comma separated).
///
/// Anything that does not start with `unsafe` is treated as safe.
pub fn parse_verdict(raw: &str) -> SafetyVerdict {
    let mut lines = raw.trim().lines();
    let first = lines.next().unwrap_or_default().trim();

    if !first.eq_ignore_ascii_case("unsafe") {
        return SafetyVerdict::Safe;
    }

    let categories = lines
        .flat_map(|line| line.split(','))
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    SafetyVerdict::Unsafe { categories }
}

//! Generator trait and a scripted implementation for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{LlmError, Result};
use crate::types::{Generation, GenerationRequest, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// Generator Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Turns a prompt into text.
///
/// Implementations must be safe to call concurrently from many requests and
/// must surface failures as an [`LlmError`], never as partial text. Transport
/// retries belong inside the implementation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Render the request and return the generated text.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation>;

    /// Get the name of this generator.
    fn name(&self) -> &str;

    /// Check if the generator is reachable and properly configured.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A generator that can be shared across tasks.
pub type SharedGenerator = Arc<dyn Generator>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Generator
// ─────────────────────────────────────────────────────────────────────────────

type Script = Box<dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync>;

/// A generator for tests.
///
/// Either replays queued replies in order, or answers through a script that
/// sees each request (handy for routing on [`GenerationRequest::purpose`]).
pub struct MockGenerator {
    name: String,
    replies: Mutex<VecDeque<Result<String>>>,
    script: Option<Script>,
    usage: Usage,
    request_log: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    /// Create a mock that returns the given texts in order.
    ///
    /// Once the queue is exhausted every call fails with a backend error.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "mock".to_string(),
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            script: None,
            usage: Usage::new(10, 20),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same text.
    pub fn with_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::scripted(move |_| Ok(text.clone()))
    }

    /// Create a mock that answers every request through `script`.
    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: "mock".to_string(),
            replies: Mutex::new(VecDeque::new()),
            script: Some(Box::new(script)),
            usage: Usage::new(10, 20),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Queue a failure to be returned by the next unanswered call.
    pub fn push_error(&self, error: LlmError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Set the usage reported for every reply.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// Get all requests that were made to this generator.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.request_log.lock().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }

    /// Count requests made for one purpose.
    pub fn count_for(&self, purpose: &str) -> usize {
        self.request_log
            .lock()
            .iter()
            .filter(|r| r.purpose == purpose)
            .count()
    }
}

impl std::fmt::Debug for MockGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGenerator")
            .field("name", &self.name)
            .field("queued", &self.replies.lock().len())
            .field("scripted", &self.script.is_some())
            .finish()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        self.request_log.lock().push(request.clone());

        let queued = self.replies.lock().pop_front();
        let text = match (queued, &self.script) {
            (Some(reply), _) => reply?,
            (None, Some(script)) => script(&request)?,
            (None, None) => {
                return Err(LlmError::backend(
                    "MockGenerator: no more responses available",
                ));
            }
        };

        Ok(Generation::new(text, "mock-model", self.usage))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn request(purpose: &str) -> GenerationRequest {
        GenerationRequest::new(purpose, "system", "user")
    }

    #[tokio::test]
    async fn test_mock_generator_in_order() {
        let generator = MockGenerator::new(["First", "Second"]);

        let r1 = generator.generate(request("a")).await.unwrap();
        let r2 = generator.generate(request("b")).await.unwrap();

        assert_eq!(r1.text, "First");
        assert_eq!(r2.text, "Second");
        assert_eq!(generator.request_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_generator_exhausted() {
        let generator = MockGenerator::new(Vec::<String>::new());
        let result = generator.generate(request("a")).await;
        assert!(matches!(result, Err(LlmError::Backend(_))));
    }

    #[tokio::test]
    async fn test_mock_generator_scripted_by_purpose() {
        let generator = MockGenerator::scripted(|req| match req.purpose.as_str() {
            "score" => Ok("0.9".to_string()),
            other => Ok(format!("text for {other}")),
        });

        assert_eq!(generator.generate(request("score")).await.unwrap().text, "0.9");
        assert_eq!(
            generator.generate(request("craft")).await.unwrap().text,
            "text for craft"
        );
        assert_eq!(generator.count_for("score"), 1);
    }

    #[tokio::test]
    async fn test_queued_error_takes_precedence_over_script() {
        let generator = MockGenerator::with_text("fine");
        generator.push_error(LlmError::Network("boom".to_string()));

        assert!(generator.generate(request("a")).await.is_err());
        assert_eq!(generator.generate(request("a")).await.unwrap().text, "fine");
    }

    #[tokio::test]
    async fn test_mock_generator_usage() {
        let generator = MockGenerator::with_text("x").with_usage(Usage::new(100, 50));
        let generation = generator.generate(request("a")).await.unwrap();
        assert_eq!(generation.usage.total(), 150);
        assert!(generator.health_check().await.is_ok());
    }
}

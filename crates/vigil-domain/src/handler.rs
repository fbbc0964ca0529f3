//! The request handler: one user question in, one answer out.
//!
//! ```text
//! validate → sanitize → rate limit → safety → response cache
//!                                                  │ miss
//!                                                  ▼
//!                          memory search → controller run → cache + memory store
//! ```
//!
//! [`RequestHandler::handle`] never fails. Every refusal and every
//! downstream error becomes a user-facing message, and is counted.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use vigil_agent::{QualityController, Terminal};
use vigil_cache::cache_key;
use vigil_memory::{Exchange, Metadata, NO_HISTORY, format_history};
use vigil_metrics::{HealthStatus, MetricsSummary, REQUEST_LATENCY, REQUESTS_TOTAL};
use vigil_validation::{DEFAULT_LOG_PREVIEW_CHARS, sanitize_for_logging, sanitize_query};

use crate::safety::{BLOCKED_RESPONSE, SafetyVerdict};
use crate::services::Services;

/// Reply when the rate limiter refuses a request.
pub const RATE_LIMITED_RESPONSE: &str =
    "You're sending messages too quickly. Please wait a moment and try again.";

/// Reply when the controller fails.
pub const ERROR_RESPONSE: &str = "I apologize, but I encountered an error processing your request. \
Please try again or rephrase your question.";

/// Metadata `type` attached to every stored exchange.
pub const MEMORY_RECORD_TYPE: &str = "support_query";

// Counter names.
pub const VALIDATION_FAILURES: &str = "validation_failures";
pub const SAFETY_BLOCKED: &str = "safety_blocked";
pub const RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";
pub const CACHE_HITS: &str = "cache_hits";
pub const CACHE_MISSES: &str = "cache_misses";
pub const SUCCESSFUL_RESPONSES: &str = "successful_responses";
pub const ERRORS: &str = "errors";
pub const CACHE_SIZE: &str = "cache_size";

// ─────────────────────────────────────────────────────────────────────────────
// Answer
// ─────────────────────────────────────────────────────────────────────────────

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Both quality gates passed.
    Pass,
    /// A gate ran out of iterations; the response is the fallback text.
    MaxIterationsReached,
    /// Served from the response cache.
    Cached,
    /// Rejected by input validation.
    Invalid,
    /// Rejected by the safety classifier.
    Blocked,
    /// Refused by the rate limiter.
    RateLimited,
    /// The controller failed.
    Error,
}

impl AnswerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::MaxIterationsReached => "max_iterations_reached",
            Self::Cached => "cached",
            Self::Invalid => "invalid",
            Self::Blocked => "blocked",
            Self::RateLimited => "rate_limited",
            Self::Error => "error",
        }
    }
}

impl From<Terminal> for AnswerOutcome {
    fn from(terminal: Terminal) -> Self {
        match terminal {
            Terminal::Pass => Self::Pass,
            Terminal::MaxIterationsReached => Self::MaxIterationsReached,
        }
    }
}

impl std::fmt::Display for AnswerOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality figures from a controller run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerScores {
    pub groundedness: f64,
    pub precision: f64,
    pub groundedness_loops: u32,
    pub precision_loops: u32,
    pub tokens_used: u64,
}

/// Full result of handling one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub response: String,
    pub outcome: AnswerOutcome,
    pub cached: bool,
    /// Present only when the controller ran for this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<AnswerScores>,
}

impl Answer {
    fn short(outcome: AnswerOutcome, response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            outcome,
            cached: outcome == AnswerOutcome::Cached,
            scores: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for answering user questions.
#[derive(Debug)]
pub struct RequestHandler {
    services: Services,
    controller: QualityController,
}

impl RequestHandler {
    pub fn new(services: Services) -> Self {
        let controller = services.controller();
        Self {
            services,
            controller,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Answer `query` for `user_id`. Never fails.
    pub async fn handle(&self, user_id: &str, query: &str) -> String {
        self.handle_detailed(user_id, query).await.response
    }

    /// Answer `query` for `user_id`, reporting how the answer came about.
    pub async fn handle_detailed(&self, user_id: &str, query: &str) -> Answer {
        let metrics = &self.services.metrics;
        metrics.increment(REQUESTS_TOTAL);
        let _timer = metrics.start_timer(REQUEST_LATENCY);

        if let Err(e) = self
            .services
            .validator
            .validate_request(user_id, query)
            .into_result()
        {
            metrics.increment(VALIDATION_FAILURES);
            warn!(
                user_id = %sanitize_for_logging(user_id, DEFAULT_LOG_PREVIEW_CHARS),
                reason = %e.report.messages(),
                "Validation failed"
            );
            return Answer::short(AnswerOutcome::Invalid, e.to_string());
        }

        let user_id = user_id.trim();
        let query = sanitize_query(query);
        info!(
            user_id = %user_id,
            query = %sanitize_for_logging(&query, 100),
            "Handling query"
        );

        let handler_config = &self.services.handler;
        let permit = match self
            .services
            .rate_limiter
            .acquire(handler_config.estimated_tokens, handler_config.acquire_timeout)
            .await
        {
            Ok(permit) => permit,
            Err(e) => {
                metrics.increment(RATE_LIMIT_EXCEEDED);
                warn!(user_id = %user_id, tier = %e.tier, "Rate limit exceeded");
                return Answer::short(AnswerOutcome::RateLimited, RATE_LIMITED_RESPONSE);
            }
        };

        match self.services.safety.classify(&query).await {
            Ok(SafetyVerdict::Safe) => {}
            Ok(SafetyVerdict::Unsafe { categories }) => {
                metrics.increment(SAFETY_BLOCKED);
                self.services.rate_limiter.reconcile(permit, 0);
                warn!(user_id = %user_id, categories = ?categories, "Unsafe input blocked");
                return Answer::short(AnswerOutcome::Blocked, BLOCKED_RESPONSE);
            }
            Err(e) => {
                warn!(
                    classifier = %self.services.safety.name(),
                    error = %e,
                    "Safety check failed, allowing input"
                );
            }
        }

        let key = cache_key(&[user_id, &query]);
        if let Some(cached) = self.services.response_cache.get(&key) {
            metrics.increment(CACHE_HITS);
            self.services.rate_limiter.reconcile(permit, 0);
            debug!(user_id = %user_id, "Cache hit");
            return Answer::short(AnswerOutcome::Cached, cached);
        }
        metrics.increment(CACHE_MISSES);

        let history = self.history(user_id, &query).await;
        let state = self.controller.new_state(query.clone()).with_history(history);

        match self.controller.run(state).await {
            Ok(outcome) => {
                let state = &outcome.state;
                self.services.response_cache.set_with_ttl(
                    key,
                    state.response.clone(),
                    handler_config.response_ttl,
                );
                self.remember(user_id, &query, &state.response, outcome.terminal)
                    .await;
                self.services.rate_limiter.reconcile(permit, state.tokens_used);

                metrics.increment(SUCCESSFUL_RESPONSES);
                metrics.increment(&format!("outcome.{}", outcome.terminal));
                metrics.set_gauge(CACHE_SIZE, self.services.response_cache.len() as f64);

                Answer {
                    response: state.response.clone(),
                    outcome: outcome.terminal.into(),
                    cached: false,
                    scores: Some(AnswerScores {
                        groundedness: state.groundedness_score,
                        precision: state.precision_score,
                        groundedness_loops: state.groundedness_loop_count,
                        precision_loops: state.precision_loop_count,
                        tokens_used: state.tokens_used,
                    }),
                }
            }
            Err(e) => {
                metrics.record_error(e.kind(), &e.to_string());
                metrics.increment(ERRORS);
                self.services.rate_limiter.reconcile(permit, 0);
                Answer::short(AnswerOutcome::Error, ERROR_RESPONSE)
            }
        }
    }

    /// Service health derived from the error rate.
    pub fn health_status(&self) -> HealthStatus {
        self.services.metrics.health_status()
    }

    pub fn metrics_summary(&self) -> MetricsSummary {
        self.services.metrics.summary()
    }

    /// Rendered prior interactions. Memory failures yield no history.
    async fn history(&self, user_id: &str, query: &str) -> String {
        let memory = &self.services.memory;
        if !memory.is_enabled() {
            return NO_HISTORY.to_string();
        }

        match memory
            .search(user_id, query, self.services.handler.history_limit)
            .await
        {
            Ok(records) => {
                debug!(user_id = %user_id, count = records.len(), "Retrieved memories");
                format_history(&records)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to retrieve history");
                NO_HISTORY.to_string()
            }
        }
    }

    /// Store the exchange. Failures are logged and dropped.
    async fn remember(&self, user_id: &str, query: &str, response: &str, terminal: Terminal) {
        let memory = &self.services.memory;
        if !memory.is_enabled() {
            return;
        }

        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), Value::from(MEMORY_RECORD_TYPE));
        metadata.insert(
            "timestamp".to_string(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        metadata.insert("outcome".to_string(), Value::from(terminal.as_str()));

        let exchange = Exchange::new(query, response);
        if let Err(e) = memory.store(user_id, &exchange, metadata).await {
            warn!(user_id = %user_id, error = %e, "Failed to store interaction");
        }
    }
}

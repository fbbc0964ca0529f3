//! The quality-control controller.
//!
//! A run is a loop over [`Step`]s: apply the current step to the
//! [`RequestState`], then ask [`next_step`] where to go. Steps execute
//! strictly in order; the iteration caps are the only way a refinement
//! cycle ends early.

use std::time::Instant;

use serde::Serialize;
use vigil_cache::{Cache, cache_key};
use vigil_llm::{GenerationRequest, SharedGenerator};
use vigil_metrics::MetricsCollector;
use vigil_retrieval::{ContextItem, SharedRetriever};

use crate::error::Result;
use crate::prompts::{self, DEFAULT_DOMAIN, FALLBACK_RESPONSE, NO_CONTEXT};
use crate::score::parse_score;
use crate::state::RequestState;
use crate::step::{RoutingPolicy, Step, Terminal, next_step};

/// Counter bumped once per generator call.
pub const LLM_REQUESTS: &str = "llm_requests";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Controller settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Quality gates.
    pub policy: RoutingPolicy,
    /// Subject area named in system prompts.
    pub domain: String,
    /// Sampling temperature for expansion, answers and refinement.
    pub temperature: Option<f32>,
    /// Output cap for each generator call.
    pub max_tokens: Option<u32>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            policy: RoutingPolicy::default(),
            domain: DEFAULT_DOMAIN.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: RoutingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Result of running the controller to a terminal step.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Final state; `state.response` is the answer.
    pub state: RequestState,
    /// How the run ended.
    pub terminal: Terminal,
    /// Every step applied, in order, ending with the terminal step.
    pub trace: Vec<Step>,
}

impl RunOutcome {
    pub fn response(&self) -> &str {
        &self.state.response
    }

    /// Number of times `step` was applied.
    pub fn visits(&self, step: Step) -> usize {
        self.trace.iter().filter(|s| **s == step).count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Drives one request through expansion, retrieval, answering, scoring and
/// refinement.
///
/// Holds only shared services; all per-request data lives in the
/// [`RequestState`] passed to [`run`](Self::run).
pub struct QualityController {
    generator: SharedGenerator,
    retriever: SharedRetriever,
    metrics: MetricsCollector,
    retrieval_cache: Option<Cache<Vec<ContextItem>>>,
    config: ControllerConfig,
}

impl QualityController {
    pub fn new(generator: SharedGenerator, retriever: SharedRetriever, config: ControllerConfig) -> Self {
        Self {
            generator,
            retriever,
            metrics: MetricsCollector::default(),
            retrieval_cache: None,
            config,
        }
    }

    /// Record step latencies and generator calls here.
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// Serve repeated expanded queries from `cache`.
    pub fn with_retrieval_cache(mut self, cache: Cache<Vec<ContextItem>>) -> Self {
        self.retrieval_cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// A fresh state for `query` using the configured iteration cap.
    pub fn new_state(&self, query: impl Into<String>) -> RequestState {
        RequestState::new(query, self.config.policy.max_iterations)
    }

    /// Run `state` from the initial step until a terminal step has applied.
    ///
    /// A generator or retriever failure ends the run immediately.
    pub async fn run(&self, mut state: RequestState) -> Result<RunOutcome> {
        let started = Instant::now();
        let mut step = Step::INITIAL;
        let mut trace = Vec::new();

        tracing::info!(
            query_len = state.query.len(),
            max_iterations = state.max_iterations,
            "Controller run started"
        );

        loop {
            trace.push(step);
            state = {
                let _timer = self.metrics.start_timer(&format!("step.{step}"));
                self.apply(step, state).await?
            };

            match next_step(step, &state, &self.config.policy) {
                Some(next) => {
                    tracing::debug!(from = %step, to = %next, "Transition");
                    step = next;
                }
                None => {
                    let terminal = step.terminal().unwrap_or(Terminal::MaxIterationsReached);
                    tracing::info!(
                        terminal = %terminal,
                        steps = trace.len(),
                        groundedness = state.groundedness_score,
                        precision = state.precision_score,
                        groundedness_loops = state.groundedness_loop_count,
                        precision_loops = state.precision_loop_count,
                        tokens = state.tokens_used,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Controller run finished"
                    );
                    return Ok(RunOutcome {
                        state,
                        terminal,
                        trace,
                    });
                }
            }
        }
    }

    /// Convenience wrapper: fresh state for `query`, then [`run`](Self::run).
    pub async fn answer(&self, query: &str) -> Result<RunOutcome> {
        self.run(self.new_state(query)).await
    }

    async fn apply(&self, step: Step, state: RequestState) -> Result<RequestState> {
        tracing::debug!(step = %step, "Applying step");
        match step {
            Step::ExpandQuery => self.expand_query(state).await,
            Step::RetrieveContext => self.retrieve_context(state).await,
            Step::CraftResponse => self.craft_response(state).await,
            Step::ScoreGroundedness => self.score_groundedness(state).await,
            Step::CheckPrecision => self.check_precision(state).await,
            Step::RefineResponse => self.refine_response(state).await,
            Step::RefineQuery => self.refine_query(state).await,
            Step::MaxIterationsReached => Ok(max_iterations_reached(state)),
            Step::Pass => Ok(state),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Steps
    // ─────────────────────────────────────────────────────────────────────

    async fn expand_query(&self, mut state: RequestState) -> Result<RequestState> {
        let template = if state.query_feedback.is_empty() {
            prompts::EXPAND_USER
        } else {
            prompts::EXPAND_WITH_FEEDBACK_USER
        };
        let request = self
            .request("expand_query", prompts::EXPAND_SYSTEM, template)
            .with_var("query", state.query.clone())
            .with_var("query_feedback", state.query_feedback.clone());

        let expanded = self.generate(request, &mut state).await?;
        state.expanded_query = expanded.trim().to_string();
        Ok(state)
    }

    async fn retrieve_context(&self, mut state: RequestState) -> Result<RequestState> {
        let key = cache_key(&[&state.expanded_query]);

        if let Some(items) = self.retrieval_cache.as_ref().and_then(|c| c.get(&key)) {
            tracing::debug!(results = items.len(), "Retrieval cache hit");
            state.context = items;
            return Ok(state);
        }

        let items = self.retriever.retrieve(&state.expanded_query).await?;
        tracing::debug!(
            retriever = self.retriever.name(),
            results = items.len(),
            "Retrieved context"
        );
        if let Some(cache) = &self.retrieval_cache {
            cache.set(key, items.clone());
        }
        state.context = items;
        Ok(state)
    }

    async fn craft_response(&self, mut state: RequestState) -> Result<RequestState> {
        let context = if state.context.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            state.context_text()
        };
        let request = self
            .request("craft_response", prompts::CRAFT_SYSTEM, prompts::CRAFT_USER)
            .with_var("query", state.query.clone())
            .with_var("context", context)
            .with_var("history", state.history.clone())
            .with_var("feedback", state.response_feedback.clone());

        state.response = self.generate(request, &mut state).await?;
        Ok(state)
    }

    async fn score_groundedness(&self, mut state: RequestState) -> Result<RequestState> {
        let request = GenerationRequest::new(
            "score_groundedness",
            prompts::GROUNDEDNESS_SYSTEM,
            prompts::GROUNDEDNESS_USER,
        )
        .with_temperature(0.0)
        .with_var("context", state.context_text())
        .with_var("response", state.response.clone());

        let raw = self.generate(request, &mut state).await?;
        state.groundedness_score = parse_score(&raw);
        state.groundedness_loop_count += 1;
        tracing::debug!(
            score = state.groundedness_score,
            iteration = state.groundedness_loop_count,
            "Groundedness scored"
        );
        Ok(state)
    }

    async fn check_precision(&self, mut state: RequestState) -> Result<RequestState> {
        let request = GenerationRequest::new(
            "check_precision",
            prompts::PRECISION_SYSTEM,
            prompts::PRECISION_USER,
        )
        .with_temperature(0.0)
        .with_var("query", state.query.clone())
        .with_var("response", state.response.clone());

        let raw = self.generate(request, &mut state).await?;
        state.precision_score = parse_score(&raw);
        state.precision_loop_count += 1;
        tracing::debug!(
            score = state.precision_score,
            iteration = state.precision_loop_count,
            "Precision scored"
        );
        Ok(state)
    }

    async fn refine_response(&self, mut state: RequestState) -> Result<RequestState> {
        let request = self
            .request(
                "refine_response",
                prompts::REFINE_RESPONSE_SYSTEM,
                prompts::REFINE_RESPONSE_USER,
            )
            .with_var("query", state.query.clone())
            .with_var("response", state.response.clone());

        let suggestions = self.generate(request, &mut state).await?;
        state.response_feedback = prompts::feedback("Response", &state.response, suggestions.trim());
        Ok(state)
    }

    async fn refine_query(&self, mut state: RequestState) -> Result<RequestState> {
        let request = self
            .request(
                "refine_query",
                prompts::REFINE_QUERY_SYSTEM,
                prompts::REFINE_QUERY_USER,
            )
            .with_var("query", state.query.clone())
            .with_var("expanded_query", state.expanded_query.clone());

        let suggestions = self.generate(request, &mut state).await?;
        state.query_feedback =
            prompts::feedback("Expanded Query", &state.expanded_query, suggestions.trim());
        Ok(state)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    /// A request with the domain-rendered system prompt and configured
    /// sampling settings.
    fn request(&self, purpose: &str, system: &str, user: &str) -> GenerationRequest {
        let mut request = GenerationRequest::new(
            purpose,
            prompts::system_prompt(system, &self.config.domain),
            user,
        );
        request.temperature = self.config.temperature;
        request.max_tokens = self.config.max_tokens;
        request
    }

    async fn generate(&self, request: GenerationRequest, state: &mut RequestState) -> Result<String> {
        self.metrics.increment(LLM_REQUESTS);
        let generation = self.generator.generate(request).await?;
        state.tokens_used = state.tokens_used.saturating_add(generation.usage.total());
        Ok(generation.text)
    }
}

fn max_iterations_reached(mut state: RequestState) -> RequestState {
    tracing::warn!(
        groundedness_loops = state.groundedness_loop_count,
        precision_loops = state.precision_loop_count,
        "Max iterations reached, returning fallback response"
    );
    state.response = FALLBACK_RESPONSE.to_string();
    state
}

impl std::fmt::Debug for QualityController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityController")
            .field("generator", &self.generator.name())
            .field("retriever", &self.retriever.name())
            .field("retrieval_cache", &self.retrieval_cache.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vigil_cache::CacheConfig;
    use vigil_llm::{LlmError, MockGenerator, Usage};
    use vigil_retrieval::{Retriever, RetrievalError, StaticRetriever};

    fn corpus() -> SharedRetriever {
        Arc::new(StaticRetriever::new(vec![
            ContextItem::new("Vitamin D deficiency causes rickets in children."),
            ContextItem::new("Iron deficiency is the most common cause of anemia."),
        ]))
    }

    /// Scripted generator: groundedness scores come from `groundedness` in
    /// order (last one repeats), precision scores likewise.
    fn scored(groundedness: &'static [&'static str], precision: &'static [&'static str]) -> Arc<MockGenerator> {
        let g = AtomicUsize::new(0);
        let p = AtomicUsize::new(0);
        Arc::new(MockGenerator::scripted(move |req| {
            let pick = |list: &[&str], i: usize| list[i.min(list.len() - 1)].to_string();
            Ok(match req.purpose.as_str() {
                "expand_query" => "expanded: vitamin deficiency".to_string(),
                "craft_response" => "Vitamin D deficiency causes rickets.".to_string(),
                "score_groundedness" => pick(groundedness, g.fetch_add(1, Ordering::SeqCst)),
                "check_precision" => pick(precision, p.fetch_add(1, Ordering::SeqCst)),
                "refine_response" => "- cite the context".to_string(),
                "refine_query" => "- add synonyms".to_string(),
                other => return Err(LlmError::backend(format!("unexpected purpose {other}"))),
            })
        }))
    }

    fn controller(generator: Arc<MockGenerator>) -> QualityController {
        QualityController::new(generator, corpus(), ControllerConfig::default())
    }

    #[tokio::test]
    async fn test_pass_on_first_cycle() {
        let generator = scored(&["0.9"], &["0.8"]);
        let outcome = controller(generator.clone()).answer("What causes rickets?").await.unwrap();

        assert_eq!(outcome.terminal, Terminal::Pass);
        assert_eq!(
            outcome.trace,
            vec![
                Step::ExpandQuery,
                Step::RetrieveContext,
                Step::CraftResponse,
                Step::ScoreGroundedness,
                Step::CheckPrecision,
                Step::Pass,
            ]
        );
        assert_eq!(outcome.response(), "Vitamin D deficiency causes rickets.");
        assert_eq!(outcome.state.expanded_query, "expanded: vitamin deficiency");
        assert_eq!(outcome.state.context.len(), 2);
        assert_eq!(outcome.state.groundedness_loop_count, 1);
        assert_eq!(outcome.state.precision_loop_count, 1);
        assert_eq!(generator.request_count(), 4);
    }

    #[tokio::test]
    async fn test_groundedness_recovers_on_third_cycle() {
        let generator = scored(&["0.4", "0.5", "0.8"], &["0.9"]);
        let outcome = controller(generator.clone()).answer("What causes rickets?").await.unwrap();

        assert_eq!(outcome.state.groundedness_loop_count, 3);
        assert_eq!(outcome.visits(Step::CheckPrecision), 1);
        assert_eq!(outcome.visits(Step::RefineResponse), 2);
        assert_eq!(outcome.visits(Step::CraftResponse), 3);
        assert_eq!(outcome.terminal, Terminal::Pass);
        assert!((outcome.state.groundedness_score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_groundedness_exhausted_returns_fallback() {
        let generator = scored(&["0.3"], &["0.9"]);
        let outcome = controller(generator.clone()).answer("What causes rickets?").await.unwrap();

        assert_eq!(outcome.terminal, Terminal::MaxIterationsReached);
        assert_eq!(outcome.response(), FALLBACK_RESPONSE);
        assert_eq!(outcome.state.groundedness_loop_count, 3);
        assert_eq!(outcome.visits(Step::CheckPrecision), 0);
        assert_eq!(generator.count_for("check_precision"), 0);
        assert_eq!(outcome.trace.last(), Some(&Step::MaxIterationsReached));
    }

    #[tokio::test]
    async fn test_precision_exhausted_returns_fallback() {
        let generator = scored(&["0.9"], &["0.2"]);
        let outcome = controller(generator.clone()).answer("What causes rickets?").await.unwrap();

        assert_eq!(outcome.terminal, Terminal::MaxIterationsReached);
        assert_eq!(outcome.state.precision_loop_count, 3);
        assert_eq!(outcome.visits(Step::RefineQuery), 2);
        assert_eq!(outcome.visits(Step::ExpandQuery), 3);
        assert_eq!(outcome.response(), FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_loop_counts_never_decrease() {
        let generator = scored(&["0.1", "0.9"], &["0.1", "0.1", "0.9"]);
        let outcome = controller(generator).answer("What causes rickets?").await.unwrap();

        // Each precision retry re-expands and re-scores groundedness without
        // resetting the groundedness counter.
        assert_eq!(outcome.state.precision_loop_count, 3);
        assert_eq!(outcome.state.groundedness_loop_count, 4);
        assert_eq!(outcome.terminal, Terminal::Pass);
    }

    #[tokio::test]
    async fn test_feedback_replaces_previous() {
        let generator = scored(&["0.1", "0.1", "0.9"], &["0.9"]);
        let outcome = controller(generator.clone()).answer("What causes rickets?").await.unwrap();

        assert_eq!(
            outcome.state.response_feedback,
            "Previous Response: Vitamin D deficiency causes rickets.\nSuggestions: - cite the context"
        );

        let crafts: Vec<_> = generator
            .requests()
            .into_iter()
            .filter(|r| r.purpose == "craft_response")
            .collect();
        assert_eq!(crafts[0].variables["feedback"], "");
        assert!(crafts[1].variables["feedback"].starts_with("Previous Response:"));
    }

    #[tokio::test]
    async fn test_query_feedback_reaches_expansion() {
        let generator = scored(&["0.9"], &["0.1", "0.9"]);
        let outcome = controller(generator.clone()).answer("What causes rickets?").await.unwrap();

        assert!(outcome.state.query_feedback.starts_with("Previous Expanded Query: expanded"));
        let expansions: Vec<_> = generator
            .requests()
            .into_iter()
            .filter(|r| r.purpose == "expand_query")
            .collect();
        assert_eq!(expansions.len(), 2);
        assert!(!expansions[0].rendered_user().contains("Feedback"));
        assert!(expansions[1].rendered_user().contains("- add synonyms"));
    }

    #[tokio::test]
    async fn test_empty_context_is_not_an_error() {
        let generator = scored(&["0.9"], &["0.9"]);
        let controller = QualityController::new(
            generator.clone(),
            Arc::new(StaticRetriever::empty()),
            ControllerConfig::default(),
        );
        let outcome = controller.answer("anything at all").await.unwrap();

        assert!(outcome.state.context.is_empty());
        let craft = generator
            .requests()
            .into_iter()
            .find(|r| r.purpose == "craft_response")
            .unwrap();
        assert!(craft.rendered_user().contains(NO_CONTEXT));
    }

    #[tokio::test]
    async fn test_generator_failure_ends_run() {
        let generator = Arc::new(MockGenerator::new(["expanded", "answer"]));
        generator.push_error(LlmError::backend("evaluator down"));
        let err = controller(generator).answer("What causes rickets?").await.unwrap_err();
        assert_eq!(err.kind(), "generation");
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn retrieve(&self, _query: &str) -> vigil_retrieval::Result<Vec<ContextItem>> {
            Err(RetrievalError::Unavailable("index offline".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_retriever_failure_ends_run() {
        let generator = scored(&["0.9"], &["0.9"]);
        let controller = QualityController::new(
            generator.clone(),
            Arc::new(FailingRetriever),
            ControllerConfig::default(),
        );
        let err = controller.answer("What causes rickets?").await.unwrap_err();
        assert_eq!(err.kind(), "retrieval");
        assert_eq!(generator.count_for("craft_response"), 0);
    }

    #[tokio::test]
    async fn test_metrics_and_tokens() {
        let generator = Arc::new(
            MockGenerator::scripted(|req| {
                Ok(match req.purpose.as_str() {
                    "score_groundedness" | "check_precision" => "0.95".to_string(),
                    _ => "text".to_string(),
                })
            })
            .with_usage(Usage::new(100, 50)),
        );
        let metrics = MetricsCollector::default();
        let controller = controller(generator).with_metrics(metrics.clone());
        let outcome = controller.answer("What causes rickets?").await.unwrap();

        assert_eq!(metrics.counter(LLM_REQUESTS), 4);
        assert_eq!(outcome.state.tokens_used, 600);
        assert_eq!(metrics.latency("step.craft_response").unwrap().count, 1);
        assert_eq!(metrics.latency("step.pass").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_retrieval_cache_reuses_results() {
        let generator = scored(&["0.9"], &["0.1", "0.9"]);
        let cache: Cache<Vec<ContextItem>> = Cache::new(CacheConfig::new().with_name("retrieval"));
        let controller = controller(generator).with_retrieval_cache(cache.clone());

        controller.answer("What causes rickets?").await.unwrap();

        // Both expansions produce the same text, so the second retrieval hits.
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_domain_and_history_in_prompts() {
        let generator = scored(&["0.9"], &["0.9"]);
        let controller = QualityController::new(
            generator.clone(),
            corpus(),
            ControllerConfig::default().with_domain("pediatric nutrition"),
        );
        let state = controller
            .new_state("What causes rickets?")
            .with_history("Previous relevant interactions:\nUser: hi\n---\n");
        controller.run(state).await.unwrap();

        let craft = generator
            .requests()
            .into_iter()
            .find(|r| r.purpose == "craft_response")
            .unwrap();
        assert!(craft.system.contains("pediatric nutrition"));
        assert!(craft.rendered_user().contains("User: hi"));
    }

    #[tokio::test]
    async fn test_custom_iteration_cap() {
        let generator = scored(&["0.1"], &["0.9"]);
        let config = ControllerConfig::default()
            .with_policy(RoutingPolicy::default().with_max_iterations(1));
        let controller = QualityController::new(generator, corpus(), config);
        let outcome = controller.answer("What causes rickets?").await.unwrap();

        assert_eq!(outcome.state.groundedness_loop_count, 1);
        assert_eq!(outcome.visits(Step::RefineResponse), 0);
        assert_eq!(outcome.terminal, Terminal::MaxIterationsReached);
    }
}

//! Service wiring.
//!
//! [`Services`] holds every shared collaborator a request touches. It is
//! built once at startup, either from a [`VigilConfig`] or piece by piece in
//! tests, and cloned cheaply into each handler.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use vigil_agent::{ControllerConfig, QualityController, RoutingPolicy};
use vigil_cache::{Cache, CacheConfig};
use vigil_config::VigilConfig;
use vigil_llm::{OpenAiConfig, SharedGenerator, create_shared_generator};
use vigil_memory::{Mem0Config, Mem0Memory, NoMemory, SharedMemory};
use vigil_metrics::{MetricsCollector, MetricsConfig};
use vigil_ratelimit::{RateLimitConfig, RateLimiter};
use vigil_retrieval::{
    ContextItem, HttpRetriever, HttpRetrieverConfig, SharedRetriever, StaticRetriever,
};
use vigil_validation::InputValidator;

use crate::error::Result;
use crate::safety::{AllowAll, GuardClassifier, SharedClassifier};

/// Lifetime of a cached answer.
pub const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(300);

/// Prior interactions fetched per request.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Handler settings that are not owned by any one service.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerConfig {
    /// TTL given to each cached answer.
    pub response_ttl: Duration,
    /// Memory search limit.
    pub history_limit: usize,
    /// Token estimate charged to the rate limiter per request.
    pub estimated_tokens: u32,
    /// Wait bound for rate-limit admission.
    pub acquire_timeout: Option<Duration>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            response_ttl: DEFAULT_RESPONSE_TTL,
            history_limit: DEFAULT_HISTORY_LIMIT,
            estimated_tokens: RateLimitConfig::default().default_estimated_tokens,
            acquire_timeout: None,
        }
    }
}

impl HandlerConfig {
    pub fn with_response_ttl(mut self, ttl: Duration) -> Self {
        self.response_ttl = ttl;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_estimated_tokens(mut self, tokens: u32) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

/// Shared collaborators for request handling.
#[derive(Clone)]
pub struct Services {
    pub generator: SharedGenerator,
    pub retriever: SharedRetriever,
    pub memory: SharedMemory,
    pub safety: SharedClassifier,
    pub rate_limiter: Arc<RateLimiter>,
    pub response_cache: Cache<String>,
    pub retrieval_cache: Cache<Vec<ContextItem>>,
    pub metrics: MetricsCollector,
    pub validator: InputValidator,
    pub controller: ControllerConfig,
    pub handler: HandlerConfig,
}

impl Services {
    /// Services with defaults around the two required collaborators: no
    /// memory, no safety screening, default limits and caches.
    pub fn new(generator: SharedGenerator, retriever: SharedRetriever) -> Self {
        Self {
            generator,
            retriever,
            memory: Arc::new(NoMemory),
            safety: Arc::new(AllowAll),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            response_cache: Cache::new(CacheConfig::new().with_name("response")),
            retrieval_cache: Cache::new(CacheConfig::new().with_name("retrieval")),
            metrics: MetricsCollector::default(),
            validator: InputValidator::default(),
            controller: ControllerConfig::default(),
            handler: HandlerConfig::default(),
        }
    }

    pub fn with_memory(mut self, memory: SharedMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_safety(mut self, safety: SharedClassifier) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Arc::new(limiter);
        self
    }

    pub fn with_response_cache(mut self, cache: Cache<String>) -> Self {
        self.response_cache = cache;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_controller_config(mut self, config: ControllerConfig) -> Self {
        self.controller = config;
        self
    }

    pub fn with_handler_config(mut self, config: HandlerConfig) -> Self {
        self.handler = config;
        self
    }

    /// Build every service from configuration.
    ///
    /// Optional collaborators degrade instead of failing: no retriever URL
    /// gives an empty retriever, no memory key disables memory, and no
    /// guard key lets every query through.
    pub fn from_config(config: &VigilConfig) -> Result<Self> {
        config.validate()?;

        let generator = build_generator(config)?;
        let retriever = build_retriever(config)?;
        let memory = build_memory(config)?;
        let safety = build_safety(config)?;

        let rl = &config.rate_limit;
        let rate_limiter = RateLimiter::new(
            RateLimitConfig::new()
                .with_requests_per_minute(rl.requests_per_minute)
                .with_requests_per_hour(rl.requests_per_hour)
                .with_tokens_per_minute(rl.tokens_per_minute)
                .with_burst_multiplier(rl.burst_multiplier)
                .with_default_estimated_tokens(rl.estimated_tokens_per_request)
                .with_acquire_timeout(rl.acquire_timeout()),
        );

        let cache = &config.cache;
        let response_cache = Cache::new(
            CacheConfig::new()
                .with_name("response")
                .with_max_size(cache.response.max_size)
                .with_default_ttl(cache.response.ttl())
                .with_cleanup_interval(cache.cleanup_interval()),
        );
        let retrieval_cache = Cache::new(
            CacheConfig::new()
                .with_name("retrieval")
                .with_max_size(cache.retrieval.max_size)
                .with_default_ttl(cache.retrieval.ttl())
                .with_cleanup_interval(cache.cleanup_interval()),
        );

        let metrics = MetricsCollector::new(
            MetricsConfig::new()
                .with_max_samples(config.metrics.max_samples)
                .with_retention(config.metrics.retention()),
        );

        let quality = &config.quality;
        let controller = ControllerConfig::new()
            .with_policy(
                RoutingPolicy::new()
                    .with_groundedness_threshold(quality.groundedness_threshold)
                    .with_precision_threshold(quality.precision_threshold)
                    .with_max_iterations(quality.max_refinement_iterations),
            )
            .with_domain(quality.domain.clone())
            .with_temperature(Some(config.llm.temperature))
            .with_max_tokens(config.llm.max_tokens);

        let handler = HandlerConfig {
            response_ttl: cache.response_ttl(),
            history_limit: config.memory.search_limit,
            estimated_tokens: rl.estimated_tokens_per_request,
            acquire_timeout: Some(rl.acquire_timeout()),
        };

        info!(
            generator = %generator.name(),
            retriever = %retriever.name(),
            memory = %memory.name(),
            safety = %safety.name(),
            domain = %quality.domain,
            "Services initialized"
        );

        Ok(Self {
            generator,
            retriever,
            memory,
            safety,
            rate_limiter: Arc::new(rate_limiter),
            response_cache,
            retrieval_cache,
            metrics,
            validator: InputValidator::default(),
            controller,
            handler,
        })
    }

    /// A controller wired to these services.
    pub fn controller(&self) -> QualityController {
        QualityController::new(
            self.generator.clone(),
            self.retriever.clone(),
            self.controller.clone(),
        )
        .with_metrics(self.metrics.clone())
        .with_retrieval_cache(self.retrieval_cache.clone())
    }

    /// Start periodic expiry sweeps for both caches.
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.response_cache.spawn_cleanup_task(),
            self.retrieval_cache.spawn_cleanup_task(),
        ]
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("generator", &self.generator.name())
            .field("retriever", &self.retriever.name())
            .field("memory", &self.memory.name())
            .field("safety", &self.safety.name())
            .field("controller", &self.controller)
            .field("handler", &self.handler)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────────────────────────

const OPENAI_HOST: &str = "api.openai.com";

fn build_generator(config: &VigilConfig) -> Result<SharedGenerator> {
    let llm = &config.llm;
    // Self-hosted compatible endpoints may run without a key.
    let api_key = if llm.base_url.contains(OPENAI_HOST) {
        Some(llm.require_api_key()?.value)
    } else {
        llm.resolve_api_key().map(|s| s.value)
    };

    let mut openai = OpenAiConfig::openai(String::new())
        .with_base_url(llm.base_url.clone())
        .with_model(llm.model.clone())
        .with_timeout(llm.timeout())
        .with_max_retries(llm.max_retries)
        .with_retry_backoff(llm.retry_backoff())
        .with_default_temperature(Some(llm.temperature));
    openai.api_key = api_key;

    Ok(create_shared_generator(openai)?)
}

fn build_retriever(config: &VigilConfig) -> Result<SharedRetriever> {
    let section = &config.retriever;
    let Some(url) = section.url.as_deref().filter(|u| !u.trim().is_empty()) else {
        warn!("No retriever URL configured; answers will have no document context");
        return Ok(Arc::new(StaticRetriever::empty()));
    };

    let mut http = HttpRetrieverConfig::new(url)
        .with_top_k(section.top_k)
        .with_timeout(section.timeout())
        .with_max_retries(section.max_retries);
    if let Some(secret) = section.resolve_api_key() {
        http = http.with_api_key(secret.value);
    }
    Ok(Arc::new(HttpRetriever::new(http)?))
}

fn build_memory(config: &VigilConfig) -> Result<SharedMemory> {
    let section = &config.memory;
    match section.resolve_api_key() {
        Some(secret) => {
            let mem0 = Mem0Config::new(secret.value).with_base_url(section.base_url.clone());
            Ok(Arc::new(Mem0Memory::new(mem0)?))
        }
        None => {
            warn!(
                env_var = %section.api_key_env,
                "No memory API key configured; conversation memory disabled"
            );
            Ok(Arc::new(NoMemory))
        }
    }
}

fn build_safety(config: &VigilConfig) -> Result<SharedClassifier> {
    let section = &config.safety;
    if !section.enabled {
        return Ok(Arc::new(AllowAll));
    }
    match section.resolve_api_key() {
        Some(secret) => {
            let guard = OpenAiConfig::groq(secret.value)
                .with_base_url(section.base_url.clone())
                .with_model(section.model.clone())
                .with_name("guard")
                .with_default_temperature(None);
            Ok(Arc::new(GuardClassifier::new(create_shared_generator(guard)?)))
        }
        None => {
            warn!(
                env_var = %section.api_key_env,
                "No guard model API key configured; safety screening disabled"
            );
            Ok(Arc::new(AllowAll))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_llm::MockGenerator;

    fn offline_config() -> VigilConfig {
        let mut config = VigilConfig::default();
        config.llm.base_url = "http://localhost:11434/v1".to_string();
        config.llm.api_key_env = "VIGIL_TEST_UNSET_LLM_KEY".to_string();
        config.memory.api_key_env = "VIGIL_TEST_UNSET_MEM_KEY".to_string();
        config.safety.api_key_env = "VIGIL_TEST_UNSET_GUARD_KEY".to_string();
        config
    }

    #[test]
    fn test_from_config_degrades_optional_services() {
        let services = Services::from_config(&offline_config()).unwrap();
        assert_eq!(services.retriever.name(), "static");
        assert_eq!(services.memory.name(), "none");
        assert_eq!(services.safety.name(), "allow_all");
        assert_eq!(services.handler.response_ttl, Duration::from_secs(300));
        assert_eq!(services.handler.history_limit, 5);
    }

    #[test]
    fn test_from_config_requires_openai_key() {
        let mut config = offline_config();
        config.llm.base_url = "https://api.openai.com/v1".to_string();
        let err = Services::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("VIGIL_TEST_UNSET_LLM_KEY"));
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = offline_config();
        config.quality.groundedness_threshold = 2.0;
        assert!(Services::from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_wires_quality_settings() {
        let mut config = offline_config();
        config.quality.max_refinement_iterations = 5;
        config.quality.domain = "home networking".to_string();
        config.retriever.url = Some("http://localhost:9000/search".to_string());

        let services = Services::from_config(&config).unwrap();
        assert_eq!(services.controller.policy.max_iterations, 5);
        assert_eq!(services.controller.domain, "home networking");
        assert_eq!(services.retriever.name(), "http");
        assert_eq!(services.controller().new_state("q").max_iterations, 5);
    }

    #[test]
    fn test_new_defaults() {
        let services = Services::new(
            Arc::new(MockGenerator::with_text("x")),
            Arc::new(StaticRetriever::empty()),
        );
        assert!(!services.memory.is_enabled());
        assert_eq!(services.handler, HandlerConfig::default());
    }
}

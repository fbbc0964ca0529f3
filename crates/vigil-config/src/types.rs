//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [llm]               # generator endpoint and sampling
//! [retriever]         # document search endpoint
//! [quality]           # thresholds and refinement cap
//! [cache]             # response/retrieval caches
//! [rate_limit]        # per-minute, per-hour and token tiers
//! [metrics]           # sample retention
//! [memory]            # Mem0 conversation memory
//! [safety]            # guard model
//! [server]            # HTTP listener
//! ```
//!
//! Every section and field has a default, so an empty file is a valid
//! config and layers only need to name what they change.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::{ResolvedSecret, resolve_api_key};
use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Upper bound on `rate_limit.acquire_timeout_secs` (one hour).
pub const MAX_ACQUIRE_TIMEOUT_SECS: u64 = 3600;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub llm: LlmSection,
    pub retriever: RetrieverSection,
    pub quality: QualitySection,
    pub cache: CacheSection,
    pub rate_limit: RateLimitSection,
    pub metrics: MetricsSection,
    pub memory: MemorySection,
    pub safety: SafetySection,
    pub server: ServerSection,
}

impl VigilConfig {
    /// Create a config with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Build from an already-parsed (possibly merged) TOML table.
    pub fn from_table(table: toml::Table) -> Result<Self> {
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        unit_interval("quality.groundedness_threshold", self.quality.groundedness_threshold)?;
        unit_interval("quality.precision_threshold", self.quality.precision_threshold)?;
        if self.quality.max_refinement_iterations == 0 {
            return Err(ConfigError::invalid(
                "quality.max_refinement_iterations",
                "must be at least 1",
            ));
        }

        let rl = &self.rate_limit;
        for (field, value) in [
            ("rate_limit.requests_per_minute", rl.requests_per_minute),
            ("rate_limit.requests_per_hour", rl.requests_per_hour),
            ("rate_limit.tokens_per_minute", rl.tokens_per_minute),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than 0"));
            }
        }
        if !rl.burst_multiplier.is_finite() || rl.burst_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "rate_limit.burst_multiplier",
                format!("must be >= 1.0, got {}", rl.burst_multiplier),
            ));
        }

        if rl.acquire_timeout_secs > MAX_ACQUIRE_TIMEOUT_SECS {
            return Err(ConfigError::invalid(
                "rate_limit.acquire_timeout_secs",
                format!(
                    "must be at most {MAX_ACQUIRE_TIMEOUT_SECS}, got {}",
                    rl.acquire_timeout_secs
                ),
            ));
        }

        if self.retriever.top_k == 0 {
            return Err(ConfigError::invalid("retriever.top_k", "must be at least 1"));
        }
        if self.cache.response.max_size == 0 {
            return Err(ConfigError::invalid("cache.response.max_size", "must be at least 1"));
        }
        if self.cache.retrieval.max_size == 0 {
            return Err(ConfigError::invalid("cache.retrieval.max_size", "must be at least 1"));
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "cache.cleanup_interval_secs",
                "must be at least 1",
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::invalid(
                "llm.temperature",
                format!("must be within [0, 2], got {}", self.llm.temperature),
            ));
        }
        Ok(())
    }
}

fn unit_interval(field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be within [0, 1], got {value}"),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible generator endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: String,
    pub model: String,
    /// API key (prefer the env var; warns if set here).
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            max_retries: 3,
            retry_backoff_ms: 500,
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

impl LlmSection {
    pub fn resolve_api_key(&self) -> Option<ResolvedSecret> {
        resolve_api_key(&self.api_key_env, self.api_key.as_deref())
    }

    /// Like [`resolve_api_key`](Self::resolve_api_key) but the key is required.
    pub fn require_api_key(&self) -> Result<ResolvedSecret> {
        self.resolve_api_key()
            .ok_or_else(|| ConfigError::ApiKeyNotFound {
                section: "llm".to_string(),
                env_var: self.api_key_env.clone(),
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Retriever
// ─────────────────────────────────────────────────────────────────────────────

/// Document search endpoint. Without a `url` the service answers from an
/// empty context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub top_k: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for RetrieverSection {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            api_key_env: "VIGIL_RETRIEVER_API_KEY".to_string(),
            top_k: 5,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl RetrieverSection {
    pub fn resolve_api_key(&self) -> Option<ResolvedSecret> {
        resolve_api_key(&self.api_key_env, self.api_key.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Quality gates
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySection {
    pub groundedness_threshold: f64,
    pub precision_threshold: f64,
    pub max_refinement_iterations: u32,
    /// Subject area named in the system prompts.
    pub domain: String,
}

impl Default for QualitySection {
    fn default() -> Self {
        Self {
            groundedness_threshold: 0.7,
            precision_threshold: 0.7,
            max_refinement_iterations: 3,
            domain: "nutritional and metabolic disorders".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Cache configuration.
///
/// `response_ttl_secs` is the lifetime given to each cached answer; the
/// per-tier `ttl_secs` is the fallback for entries stored without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub response_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub response: CacheTier,
    pub retrieval: CacheTier,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            response_ttl_secs: 300,
            cleanup_interval_secs: 60,
            response: CacheTier::default(),
            retrieval: CacheTier::default(),
        }
    }
}

impl CacheSection {
    pub fn response_ttl(&self) -> Duration {
        Duration::from_secs(self.response_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTier {
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for CacheTier {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_secs: 3600,
        }
    }
}

impl CacheTier {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate limiting
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub tokens_per_minute: u32,
    pub burst_multiplier: f64,
    pub estimated_tokens_per_request: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1000,
            tokens_per_minute: 90_000,
            burst_multiplier: 1.5,
            estimated_tokens_per_request: 1000,
            acquire_timeout_secs: 30,
        }
    }
}

impl RateLimitSection {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metrics
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub retention_hours: u64,
    pub max_samples: usize,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            retention_hours: 24,
            max_samples: 10_000,
        }
    }
}

impl MetricsSection {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 60 * 60)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// Mem0 conversation memory. Disabled when no key resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub base_url: String,
    pub search_limit: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: "MEM0_API_KEY".to_string(),
            base_url: "https://api.mem0.ai".to_string(),
            search_limit: 5,
        }
    }
}

impl MemorySection {
    pub fn resolve_api_key(&self) -> Option<ResolvedSecret> {
        resolve_api_key(&self.api_key_env, self.api_key.as_deref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Safety
// ─────────────────────────────────────────────────────────────────────────────

/// Guard model that screens queries before they reach the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySection {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-guard-3-8b".to_string(),
            api_key: None,
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

impl SafetySection {
    pub fn resolve_api_key(&self) -> Option<ResolvedSecret> {
        resolve_api_key(&self.api_key_env, self.api_key.as_deref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Log one line per HTTP request.
    pub request_logging: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            request_logging: true,
        }
    }
}

impl ServerSection {
    /// `bind:port`, ready for a listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = VigilConfig::from_toml("").unwrap();
        assert_eq!(config, VigilConfig::default());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.quality.max_refinement_iterations, 3);
        assert_eq!(config.cache.response_ttl_secs, 300);
        assert_eq!(config.server.address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = VigilConfig::from_toml(
            r#"
[quality]
groundedness_threshold = 0.8

[cache.retrieval]
max_size = 50
"#,
        )
        .unwrap();
        assert_eq!(config.quality.groundedness_threshold, 0.8);
        assert_eq!(config.quality.precision_threshold, 0.7);
        assert_eq!(config.cache.retrieval.max_size, 50);
        assert_eq!(config.cache.retrieval.ttl_secs, 3600);
        assert_eq!(config.cache.response.max_size, 1000);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let mut config = VigilConfig::default();
        config.retriever.url = Some("http://localhost:9000/search".to_string());
        config.llm.max_tokens = Some(512);

        let text = config.to_toml().unwrap();
        assert!(text.contains("[rate_limit]"));
        let back = VigilConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validate_defaults_ok() {
        VigilConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = VigilConfig::default();
        config.quality.precision_threshold = 1.2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quality.precision_threshold"));
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = VigilConfig::default();
        config.quality.max_refinement_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_rate_and_small_burst() {
        let mut config = VigilConfig::default();
        config.rate_limit.requests_per_hour = 0;
        assert!(config.validate().unwrap_err().to_string().contains("requests_per_hour"));

        let mut config = VigilConfig::default();
        config.rate_limit.burst_multiplier = 0.5;
        assert!(config.validate().unwrap_err().to_string().contains("burst_multiplier"));
    }

    #[test]
    fn test_validate_rejects_unbounded_acquire_timeout() {
        let mut config = VigilConfig::default();
        config.rate_limit.acquire_timeout_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("acquire_timeout_secs"));

        config.rate_limit.acquire_timeout_secs = MAX_ACQUIRE_TIMEOUT_SECS;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_cleanup_interval() {
        let mut config = VigilConfig::default();
        config.cache.cleanup_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cleanup_interval_secs"));
    }

    #[test]
    fn test_require_api_key_names_env_var() {
        let mut config = VigilConfig::default();
        config.llm.api_key_env = "VIGIL_TEST_MISSING_LLM_KEY".to_string();
        let err = config.llm.require_api_key().unwrap_err();
        assert!(err.to_string().contains("VIGIL_TEST_MISSING_LLM_KEY"));
    }

    #[test]
    fn test_durations() {
        let config = VigilConfig::default();
        assert_eq!(config.metrics.retention(), Duration::from_secs(86_400));
        assert_eq!(config.cache.response_ttl(), Duration::from_secs(300));
        assert_eq!(config.rate_limit.acquire_timeout(), Duration::from_secs(30));
    }
}

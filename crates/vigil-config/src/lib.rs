//! Configuration for Vigil.
//!
//! Loads TOML config from the user config directory and the working
//! directory, merges the layers, and exposes typed sections for each
//! service. API keys resolve from environment variables first; keys
//! written into a file produce a warning on load.

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, data_dir, load_config, load_config_file,
    load_config_with_options, save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{ResolvedSecret, SecretSource, resolve_api_key};
pub use types::{
    CacheSection, CacheTier, LlmSection, MAX_ACQUIRE_TIMEOUT_SECS, MemorySection, MetricsSection,
    QualitySection, RateLimitSection, RetrieverSection, SafetySection, ServerSection, VigilConfig,
};

//! Result cache with LRU eviction, TTL expiry and hit statistics.
//!
//! One [`Cache`] instance is built per concern (answers, retrieval results)
//! at process start and shared by handle between requests:
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use vigil_cache::{Cache, CacheConfig, cache_key};
//!
//! let answers: Cache<String> = Cache::new(
//!     CacheConfig::new()
//!         .with_name("response")
//!         .with_max_size(1000)
//!         .with_default_ttl(Duration::from_secs(3600)),
//! );
//!
//! let key = cache_key(&["user-1", "what is ketosis?"]);
//! answers.set_with_ttl(key.clone(), "...".to_string(), Duration::from_secs(300));
//! assert!(answers.get(&key).is_some());
//! ```

mod cache;
mod config;
mod key;

pub use cache::{Cache, CacheEntry, CacheStats, MIN_CLEANUP_INTERVAL};
pub use config::{CacheConfig, DEFAULT_MAX_SIZE, DEFAULT_TTL};
pub use key::{KEY_LEN, cache_key};

//! Keyed result cache with LRU eviction and per-entry TTL.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::CacheConfig;

/// Entry stored in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached value.
    pub value: V,

    /// When this entry was inserted.
    pub created_at: Instant,

    /// Lifetime of the entry. `Duration::ZERO` never expires.
    pub ttl: Duration,

    /// Number of cache hits served by this entry.
    pub hit_count: u64,
}

impl<V> CacheEntry<V> {
    /// Create a new cache entry.
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
            hit_count: 0,
        }
    }

    /// Whether the entry has outlived its TTL at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        !self.ttl.is_zero() && now.saturating_duration_since(self.created_at) > self.ttl
    }

    /// Whether the entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// Inner state protected by a single mutex.
struct CacheInner<V> {
    /// Recency-ordered entries. Capacity is enforced by [`Cache::set_with_ttl`].
    lru: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> CacheInner<V> {
    fn remove_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .lru
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.lru.pop(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }
}

/// Result cache with LRU eviction and TTL expiry.
///
/// Every operation takes the one lock guarding the whole structure, so
/// statistics and recency order always agree. Cloning the cache yields
/// another handle to the same entries.
pub struct Cache<V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    config: CacheConfig,
}

impl<V: Clone> Cache<V> {
    /// Create a new cache.
    pub fn new(config: CacheConfig) -> Self {
        let inner = CacheInner {
            lru: LruCache::unbounded(),
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Look up a value.
    ///
    /// A missing or expired key counts as a miss; an expired entry is removed.
    /// A hit moves the key to the most-recently-used position and bumps the
    /// entry's hit counter.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();

        let expired = match inner.lru.peek(key).map(CacheEntry::is_expired) {
            None => {
                inner.misses += 1;
                trace!(cache = %self.config.name, "Cache miss");
                return None;
            }
            Some(expired) => expired,
        };

        if expired {
            inner.lru.pop(key);
            inner.misses += 1;
            inner.expirations += 1;
            debug!(cache = %self.config.name, "Cache entry expired");
            return None;
        }

        inner.hits += 1;
        let entry = inner.lru.get_mut(key)?;
        entry.hit_count += 1;
        trace!(cache = %self.config.name, hit_count = entry.hit_count, "Cache hit");
        Some(entry.value.clone())
    }

    /// Store a value with the configured default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Store a value with an explicit TTL (`Duration::ZERO` never expires).
    ///
    /// Inserting a new key while the cache is full first evicts
    /// least-recently-used entries, so the size never exceeds `max_size`.
    /// Overwriting an existing key never evicts.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let max_size = self.config.effective_max_size();
        let mut inner = self.inner.lock();

        if !inner.lru.contains(&key) {
            while inner.lru.len() >= max_size {
                match inner.lru.pop_lru() {
                    Some(_) => {
                        inner.evictions += 1;
                        debug!(cache = %self.config.name, "Evicting LRU entry to make room");
                    }
                    None => break,
                }
            }
        }

        inner.lru.put(key, CacheEntry::new(value, ttl));
        trace!(cache = %self.config.name, size = inner.lru.len(), "Cache entry stored");
    }

    /// Remove a key. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.inner.lock().lru.pop(key).is_some();
        if removed {
            debug!(cache = %self.config.name, "Cache entry invalidated");
        }
        removed
    }

    /// Remove every entry and reset statistics.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
        inner.expirations = 0;
        debug!(cache = %self.config.name, "Cache cleared");
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let count = self.inner.lock().remove_expired(Instant::now());
        if count > 0 {
            debug!(cache = %self.config.name, count = count, "Cleaned up expired entries");
        }
        count
    }

    /// Check for a live entry without touching recency or statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .lru
            .peek(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Peek at a live entry without touching recency or statistics.
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.inner
            .lock()
            .lru
            .peek(key)
            .filter(|entry| !entry.is_expired())
            .cloned()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            name: self.config.name.clone(),
            size: inner.lru.len(),
            max_size: self.config.effective_max_size(),
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            evictions: inner.evictions,
            expirations: inner.expirations,
            default_ttl_secs: self.config.default_ttl.as_secs_f64(),
        }
    }
}

/// Shortest period the background cleanup task runs at.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(10);

impl<V: Send + 'static> Cache<V> {
    /// Spawn a tokio task that removes expired entries every
    /// `cleanup_interval` (at least [`MIN_CLEANUP_INTERVAL`]). The task ends
    /// once every cache handle is dropped.
    pub fn spawn_cleanup_task(&self) -> JoinHandle<()> {
        let weak: Weak<Mutex<CacheInner<V>>> = Arc::downgrade(&self.inner);
        let interval = self.config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);
        let name = self.config.name.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!(cache = %name, "Cache dropped, stopping cleanup task");
                    break;
                };
                let count = inner.lock().remove_expired(Instant::now());
                if count > 0 {
                    debug!(cache = %name, count = count, "Background cleanup removed expired entries");
                }
            }
        })
    }
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

impl<V> std::fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.config.name)
            .field("size", &self.inner.lock().lru.len())
            .field("max_size", &self.config.max_size)
            .finish()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Cache name.
    pub name: String,

    /// Current number of entries.
    pub size: usize,

    /// Maximum capacity.
    pub max_size: usize,

    /// Lookups that returned a value.
    pub hits: u64,

    /// Lookups that found nothing or an expired entry.
    pub misses: u64,

    /// `hits / (hits + misses)`, or 0 before any lookup.
    pub hit_rate: f64,

    /// Entries removed to make room.
    pub evictions: u64,

    /// Entries removed because their TTL elapsed.
    pub expirations: u64,

    /// Default TTL in seconds (0 = never expires).
    pub default_ttl_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn cache(max: usize) -> Cache<String> {
        Cache::new(CacheConfig::new().with_max_size(max))
    }

    #[test]
    fn test_set_and_get() {
        let cache = cache(10);
        cache.set("k", "v".to_string());

        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_key_is_miss() {
        let cache = cache(10);
        assert_eq!(cache.get("nope"), None);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_ttl_expiration_evicts_on_get() {
        let cache = cache(10);
        cache.set_with_ttl("k", "v".to_string(), Duration::from_millis(50));
        assert_eq!(cache.get("k"), Some("v".to_string()));

        sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let cache: Cache<u32> = Cache::new(CacheConfig::new().without_ttl().with_max_size(4));
        cache.set("k", 7);
        sleep(Duration::from_millis(20)).await;

        assert!(cache.contains("k"));
        assert_eq!(cache.get("k"), Some(7));
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = cache(3);
        for i in 1..=3 {
            cache.set(format!("k{i}"), format!("v{i}"));
        }
        assert_eq!(cache.len(), 3);

        cache.set("k4", "v4".to_string());

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("k1"));
        assert!(cache.contains("k2"));
        assert!(cache.contains("k3"));
        assert!(cache.contains("k4"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = cache(3);
        for i in 1..=3 {
            cache.set(format!("k{i}"), format!("v{i}"));
        }

        // k1 becomes most recently used, so k2 is evicted next.
        assert!(cache.get("k1").is_some());
        cache.set("k4", "v4".to_string());

        assert!(cache.contains("k1"));
        assert!(!cache.contains("k2"));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = cache(2);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.set("a", "3".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some("3".to_string()));
        assert!(cache.contains("b"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let cache = cache(5);
        for i in 0..50 {
            cache.set(format!("k{i}"), i.to_string());
            assert!(cache.len() <= 5);
        }
        assert_eq!(cache.stats().evictions, 45);
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        let cache = cache(0);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_entry_hit_count() {
        let cache = cache(10);
        cache.set("k", "v".to_string());
        cache.get("k");
        cache.get("k");

        let entry = cache.peek_entry("k").unwrap();
        assert_eq!(entry.hit_count, 2);
        assert_eq!(entry.ttl, crate::config::DEFAULT_TTL);
    }

    #[test]
    fn test_invalidate() {
        let cache = cache(10);
        cache.set("k", "v".to_string());

        assert!(cache.invalidate("k"));
        assert!(!cache.invalidate("k"));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_clear_resets_stats() {
        let cache = cache(10);
        cache.set("k", "v".to_string());
        cache.get("k");
        cache.get("missing");

        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = cache(10);
        cache.set_with_ttl("short1", "a".to_string(), Duration::from_millis(30));
        cache.set_with_ttl("short2", "b".to_string(), Duration::from_millis(30));
        cache.set_with_ttl("long", "c".to_string(), Duration::from_secs(60));

        sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("long"));
        assert_eq!(cache.stats().expirations, 2);
    }

    #[test]
    fn test_hit_rate() {
        let cache = cache(10);
        cache.set("k", "v".to_string());
        cache.get("k");
        cache.get("k");
        cache.get("k");
        cache.get("x");

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_peek_has_no_side_effects() {
        let cache = cache(2);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());

        assert!(cache.peek_entry("a").is_some());
        assert!(cache.contains("a"));
        cache.set("c", "3".to_string());

        // Peeking did not refresh "a".
        assert!(!cache.contains("a"));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = cache(64);
        std::thread::scope(|scope| {
            for t in 0..8 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for i in 0..200 {
                        let key = format!("k{}", (t * 7 + i) % 100);
                        if cache.get(&key).is_none() {
                            cache.set(key, i.to_string());
                        }
                    }
                });
            }
        });

        let stats = cache.stats();
        assert!(stats.size <= 64);
        assert_eq!(stats.hits + stats.misses, 8 * 200);
    }

    #[tokio::test]
    async fn test_background_cleanup_task() {
        let cache: Cache<String> = Cache::new(
            CacheConfig::new()
                .with_max_size(10)
                .with_cleanup_interval(Duration::from_millis(20)),
        );
        cache.set_with_ttl("k", "v".to_string(), Duration::from_millis(10));
        let handle = cache.spawn_cleanup_task();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.len(), 0);

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup task should stop once the cache is dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_cleanup_interval_is_floored() {
        let cache: Cache<String> = Cache::new(
            CacheConfig::new()
                .with_max_size(10)
                .with_cleanup_interval(Duration::ZERO),
        );
        cache.set_with_ttl("k", "v".to_string(), Duration::from_millis(10));
        let handle = cache.spawn_cleanup_task();

        sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        assert_eq!(cache.len(), 0);
        handle.abort();
    }
}

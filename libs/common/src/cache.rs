//! TTL cache for successful GET responses
//!
//! Entries are keyed by endpoint plus serialized parameters and evicted
//! lazily: an expired entry is dropped the moment a read observes it. There
//! is no background sweep.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::clock::Clock;

/// Default entry lifetime: 5 minutes
pub const DEFAULT_TTL_SECS: i64 = 5 * 60;

struct Entry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// In-memory cache with per-entry expiry
pub struct TtlCache<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    /// Create a cache with the default 5-minute TTL
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, DEFAULT_TTL_SECS)
    }

    /// Create a cache with a custom default TTL in seconds
    pub fn with_ttl(clock: Arc<dyn Clock>, ttl_secs: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: Duration::seconds(ttl_secs),
            clock,
        }
    }

    /// Store a value under `key`, with an optional TTL override in seconds
    pub fn set(&self, key: &str, value: T, ttl_secs: Option<i64>) {
        let ttl = ttl_secs.map(Duration::seconds).unwrap_or(self.default_ttl);
        let expires_at = self.clock.now() + ttl;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), Entry { value, expires_at });
    }

    /// Get the value stored under `key`, evicting it if expired
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(key) {
            Some(entry) if self.clock.now() > entry.expires_at => {
                debug!("cache entry expired: {}", key);
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Remove the value stored under `key`
    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Remove every key containing `pattern`
    pub fn invalidate(&self, pattern: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key, _| !key.contains(pattern));
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Number of entries currently stored, expired or not
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache_with_clock() -> (TtlCache<serde_json::Value>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(DateTime::UNIX_EPOCH));
        (TtlCache::new(Arc::clone(&clock) as Arc<dyn Clock>), clock)
    }

    #[test]
    fn hit_before_expiry_miss_after() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", serde_json::json!({"a": 1}), None);

        clock.advance(Duration::seconds(DEFAULT_TTL_SECS - 1));
        assert!(cache.get("k").is_some());

        clock.advance(Duration::seconds(2));
        assert!(cache.get("k").is_none());
        // lazily evicted on the read above
        assert!(cache.is_empty());
    }

    #[test]
    fn custom_ttl_overrides_default() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", serde_json::json!(1), Some(10));

        clock.advance(Duration::seconds(11));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn invalidate_by_pattern() {
        let (cache, _clock) = cache_with_clock();
        cache.set("/api/Articulos/GetArticulos?page=1", serde_json::json!(1), None);
        cache.set("/api/Articulos/GetArticulos?page=2", serde_json::json!(2), None);
        cache.set("/api/Categorias/GetCategorias", serde_json::json!(3), None);

        cache.invalidate("Articulos");

        assert_eq!(cache.len(), 1);
        assert!(cache.get("/api/Categorias/GetCategorias").is_some());
    }

    #[test]
    fn expired_entries_are_not_swept_in_background() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", serde_json::json!(1), None);

        clock.advance(Duration::seconds(DEFAULT_TTL_SECS + 1));
        // still counted until a read observes the expiry
        assert_eq!(cache.len(), 1);
    }
}

//! Short-lived response cache for GET requests
//!
//! Entries are keyed by method, full path with query, and the caller's
//! credential. Expired entries stay in the map until they are overwritten or
//! evicted; `lookup` simply ignores them. When the map grows past
//! `max_entries`, the `evict_batch` oldest-inserted entries go, whether or not
//! they are still fresh.

use crate::{CoreError, Result};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cache settings
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
    /// Size above which a batch is evicted
    pub max_entries: usize,
    /// Entries evicted per overflow
    pub evict_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            max_entries: 100,
            evict_batch: 10,
        }
    }
}

/// Composite cache key
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CacheKey {
    method: String,
    path_and_query: String,
    credential: String,
}

impl CacheKey {
    /// Build a key from the request method, original path with query, and
    /// caller credential
    pub fn new(method: &str, path_and_query: &str, credential: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path_and_query: path_and_query.to_string(),
            credential: credential.to_string(),
        }
    }
}

/// A stored upstream response body
#[derive(Clone, Debug, PartialEq)]
pub struct CachedResponse {
    /// JSON body as returned by the backend
    pub body: Value,
    /// When the body was stored
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Body as served on a hit, carrying `_cached` and `_cachedAt`
    ///
    /// Non-object bodies are wrapped under `data`.
    pub fn annotated_body(&self) -> Value {
        let mut object = match &self.body {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };

        object.insert("_cached".to_string(), Value::Bool(true));
        object.insert(
            "_cachedAt".to_string(),
            Value::String(self.stored_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Value::Object(object)
    }
}

/// Mutex-guarded, insertion-ordered response store
pub struct ResponseCache {
    entries: Mutex<LruCache<CacheKey, CachedResponse>>,
    ttl: TimeDelta,
    max_entries: usize,
    evict_batch: usize,
}

impl ResponseCache {
    /// Create a cache from settings
    pub fn new(config: CacheConfig) -> Result<Self> {
        if config.max_entries == 0 {
            return Err(CoreError::ZeroSetting("cache max entries"));
        }
        if config.evict_batch == 0 {
            return Err(CoreError::ZeroSetting("cache eviction batch"));
        }

        let ttl = i64::try_from(config.ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or(CoreError::ZeroSetting("cache ttl"))?;

        Ok(Self {
            entries: Mutex::new(LruCache::unbounded()),
            ttl,
            max_entries: config.max_entries,
            evict_batch: config.evict_batch,
        })
    }

    /// Return the entry for `key` if it is still fresh
    ///
    /// Uses `peek`, so a hit does not change eviction order.
    pub fn lookup(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CachedResponse> {
        let entries = self.entries.lock();
        entries
            .peek(key)
            .filter(|entry| now - entry.stored_at < self.ttl)
            .cloned()
    }

    /// Store a response, replacing any previous value for `key`
    ///
    /// Replacing keeps the key's original insertion position. Returns the
    /// number of entries evicted.
    pub fn store(&self, key: CacheKey, body: Value, now: DateTime<Utc>) -> usize {
        let response = CachedResponse {
            body,
            stored_at: now,
        };

        let mut entries = self.entries.lock();
        match entries.peek_mut(&key) {
            Some(existing) => *existing = response,
            None => {
                entries.push(key, response);
            }
        }

        if entries.len() <= self.max_entries {
            return 0;
        }

        let mut evicted = 0;
        while evicted < self.evict_batch && entries.pop_lru().is_some() {
            evicted += 1;
        }
        drop(entries);

        tracing::debug!(evicted, "Response cache over capacity, evicted oldest entries");
        evicted
    }

    /// Entry lifetime
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Size above which eviction runs
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn cache() -> ResponseCache {
        ResponseCache::new(CacheConfig::default()).unwrap()
    }

    fn key(path: &str) -> CacheKey {
        CacheKey::new("GET", path, "key-a")
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = cache();
        cache.store(key("/api/users"), json!({"users": [1, 2]}), t0());

        let hit = cache
            .lookup(&key("/api/users"), t0() + TimeDelta::seconds(29))
            .unwrap();
        assert_eq!(hit.stored_at, t0());
        assert_eq!(hit.body, json!({"users": [1, 2]}));
    }

    #[test]
    fn test_expired_entry_is_invisible_but_kept() {
        let cache = cache();
        cache.store(key("/a"), json!({}), t0());

        assert!(cache.lookup(&key("/a"), t0() + TimeDelta::seconds(30)).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_components_are_distinct() {
        let cache = cache();
        cache.store(key("/a?x=1"), json!({"v": 1}), t0());

        assert!(cache.lookup(&key("/a?x=2"), t0()).is_none());
        assert!(cache.lookup(&key("/a"), t0()).is_none());
        assert!(cache
            .lookup(&CacheKey::new("GET", "/a?x=1", "key-b"), t0())
            .is_none());
        assert!(cache
            .lookup(&CacheKey::new("HEAD", "/a?x=1", "key-a"), t0())
            .is_none());
        assert!(cache
            .lookup(&CacheKey::new("get", "/a?x=1", "key-a"), t0())
            .is_some());
    }

    #[test]
    fn test_store_overwrites() {
        let cache = cache();
        cache.store(key("/a"), json!({"v": 1}), t0());
        cache.store(key("/a"), json!({"v": 2}), t0() + TimeDelta::seconds(5));

        let hit = cache.lookup(&key("/a"), t0() + TimeDelta::seconds(6)).unwrap();
        assert_eq!(hit.body, json!({"v": 2}));
        assert_eq!(hit.stored_at, t0() + TimeDelta::seconds(5));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_batch_eviction_by_insertion_order() {
        let cache = cache();
        for i in 0..100 {
            assert_eq!(cache.store(key(&format!("/{i}")), json!(i), t0()), 0);
        }
        assert_eq!(cache.len(), 100);

        // reads do not protect an entry from eviction
        assert!(cache.lookup(&key("/0"), t0()).is_some());

        let evicted = cache.store(key("/100"), json!(100), t0());
        assert_eq!(evicted, 10);
        assert_eq!(cache.len(), 91);
        assert!(cache.len() <= 100 - 10 + 1);

        for i in 0..10 {
            assert!(cache.lookup(&key(&format!("/{i}")), t0()).is_none());
        }
        for i in 10..=100 {
            assert!(cache.lookup(&key(&format!("/{i}")), t0()).is_some());
        }
    }

    #[test]
    fn test_overwrite_keeps_insertion_position() {
        let cache = ResponseCache::new(CacheConfig {
            ttl_secs: 30,
            max_entries: 3,
            evict_batch: 1,
        })
        .unwrap();

        cache.store(key("/first"), json!(1), t0());
        cache.store(key("/second"), json!(2), t0());
        cache.store(key("/third"), json!(3), t0());
        cache.store(key("/first"), json!(11), t0());
        cache.store(key("/fourth"), json!(4), t0());

        assert!(cache.lookup(&key("/first"), t0()).is_none());
        assert!(cache.lookup(&key("/second"), t0()).is_some());
    }

    #[test]
    fn test_annotated_body() {
        let entry = CachedResponse {
            body: json!({"id": 7}),
            stored_at: t0(),
        };
        assert_eq!(
            entry.annotated_body(),
            json!({"id": 7, "_cached": true, "_cachedAt": "2024-01-01T12:00:00.000Z"})
        );

        let entry = CachedResponse {
            body: json!([1, 2]),
            stored_at: t0(),
        };
        let annotated = entry.annotated_body();
        assert_eq!(annotated["data"], json!([1, 2]));
        assert_eq!(annotated["_cached"], json!(true));
    }

    #[test]
    fn test_concurrent_stores_last_write_wins() {
        let cache = cache();
        std::thread::scope(|s| {
            for i in 0..8 {
                let cache = &cache;
                s.spawn(move || {
                    for _ in 0..50 {
                        cache.store(key("/shared"), json!({"writer": i}), t0());
                    }
                });
            }
        });

        assert_eq!(cache.len(), 1);
        let hit = cache.lookup(&key("/shared"), t0()).unwrap();
        let writer = hit.body["writer"].as_i64().unwrap();
        assert!((0..8).contains(&writer));
    }

    #[test]
    fn test_zero_settings_rejected() {
        for config in [
            CacheConfig { ttl_secs: 0, ..Default::default() },
            CacheConfig { max_entries: 0, ..Default::default() },
            CacheConfig { evict_batch: 0, ..Default::default() },
        ] {
            assert!(ResponseCache::new(config).is_err());
        }
    }
}

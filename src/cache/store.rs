//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with a tag index, read-time
//! freshness evaluation and least-recently-accessed eviction.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{
    CacheConfig, CacheEntry, CacheStats, Capacity, Freshness, SharedClock, SystemClock, TagIndex,
};
use crate::error::{CacheError, Result};

/// Caller-supplied estimate of a payload's size in bytes.
pub type SizeEstimator<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

// == Lookup ==
/// Result of a store read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Fresh(V),
    /// Past its TTL but still servable under stale-while-revalidate
    Stale(V),
    Miss,
}

impl<V> Lookup<V> {
    /// Returns the value for fresh and stale lookups.
    pub fn into_value(self) -> Option<V> {
        match self {
            Lookup::Fresh(v) | Lookup::Stale(v) => Some(v),
            Lookup::Miss => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Lookup::Fresh(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Lookup::Stale(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss)
    }
}

// == Cache Store ==
/// In-memory key to entry map with tag-based invalidation and capacity
/// enforcement.
///
/// Expiry is evaluated lazily: nothing is removed on a timer. An expired
/// entry is dropped when `get` next touches it, when it is evicted, or on an
/// explicit `purge_expired`.
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Tag to keys index, mutated only from here
    tags: TagIndex,
    /// Hit/miss/eviction counters
    stats: CacheStats,
    total_size_bytes: usize,
    next_sequence: u64,
    clock: SharedClock,
    size_of: SizeEstimator<V>,
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.entries.len())
            .field("tags", &self.tags.tag_count())
            .field("total_size_bytes", &self.total_size_bytes)
            .field("stats", &self.stats)
            .field("clock", &self.clock)
            .finish()
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore<serde_json::Value> {
    /// Creates a store for JSON payloads, sized by their serialized length.
    pub fn json() -> Self {
        Self::new().with_size_estimator(|value: &serde_json::Value| {
            serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
        })
    }
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates an empty store on the system clock.
    ///
    /// Payloads are sized as `size_of::<V>()` until an estimator is supplied.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tags: TagIndex::new(),
            stats: CacheStats::new(),
            total_size_bytes: 0,
            next_sequence: 0,
            clock: Arc::new(SystemClock),
            size_of: Arc::new(|_: &V| std::mem::size_of::<V>()),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the payload size estimator.
    pub fn with_size_estimator<F>(mut self, estimator: F) -> Self
    where
        F: Fn(&V) -> usize + Send + Sync + 'static,
    {
        self.size_of = Arc::new(estimator);
        self
    }

    /// Current time on the store's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // == Get ==
    /// Reads `key`, classifying it at the current time.
    ///
    /// Every call records an access and bumps either the hit counter (fresh
    /// or stale) or the miss counter. An expired entry found here is
    /// dropped.
    pub fn get(&mut self, key: &str) -> Lookup<V> {
        let now = self.clock.now_ms();

        let Some(entry) = self.entries.get_mut(key) else {
            self.stats.record_miss();
            debug!(key = %key, "cache miss");
            return Lookup::Miss;
        };

        entry.touch(now);
        match entry.freshness(now) {
            Freshness::Fresh => {
                self.stats.record_hit();
                debug!(key = %key, "cache hit");
                Lookup::Fresh(entry.value.clone())
            }
            Freshness::Stale => {
                self.stats.record_hit();
                debug!(key = %key, "cache hit (stale)");
                Lookup::Stale(entry.value.clone())
            }
            Freshness::Expired => {
                self.stats.record_miss();
                debug!(key = %key, "cache miss (expired)");
                self.remove_entry(key);
                self.assert_invariants();
                Lookup::Miss
            }
        }
    }

    // == Set ==
    /// Stores or overwrites `key` under `config`.
    ///
    /// An overwrite resets the creation time, replaces the tags and applies
    /// the size delta. If the store then exceeds `config.capacity`, the
    /// least recently accessed entries are evicted until it fits. The entry
    /// being written is never its own eviction victim.
    ///
    /// # Errors
    /// `CacheError::Configuration` if the config is invalid or the entry
    /// alone exceeds a byte budget. The store is left untouched in that case.
    pub fn set(&mut self, key: impl Into<String>, value: V, config: &CacheConfig) -> Result<()> {
        config.validate()?;
        let key = key.into();

        let size_bytes = (self.size_of)(&value);
        if let Capacity::Bytes(max) = config.capacity {
            if size_bytes > max {
                return Err(CacheError::Configuration(format!(
                    "entry '{}' is {} bytes, larger than the {} byte budget",
                    key, size_bytes, max
                )));
            }
        }

        let now = self.clock.now_ms();
        self.remove_entry(&key);

        let mut entry = CacheEntry::new(key.clone(), value, size_bytes, config, now);
        entry.sequence = self.next_sequence;
        self.next_sequence += 1;

        for tag in &entry.tags {
            self.tags.add(tag, &key);
        }
        self.total_size_bytes += size_bytes;
        self.entries.insert(key.clone(), entry);

        self.enforce_capacity(config.capacity, &key);
        self.assert_invariants();
        Ok(())
    }

    // == Delete ==
    /// Removes `key` and its tag memberships. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key).is_some();
        self.assert_invariants();
        removed
    }

    // == Has ==
    /// Freshness-aware presence check with no side effects.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| entry.is_servable(now))
    }

    // == Invalidate By Tag ==
    /// Removes every entry indexed under `tag`. Returns the number removed.
    pub fn invalidate_by_tag(&mut self, tag: &str) -> usize {
        let keys = self.tags.take(tag);
        let removed = keys
            .iter()
            .filter(|key| self.remove_entry(key).is_some())
            .count();

        info!(tag = %tag, removed, "invalidated entries by tag");
        self.assert_invariants();
        removed
    }

    // == Clear ==
    /// Empties the store and the tag index, and resets the counters.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.tags.clear();
        self.total_size_bytes = 0;
        self.stats = CacheStats::new();
        info!(dropped, "cache cleared");
        self.assert_invariants();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            total_size_bytes: self.total_size_bytes,
            ..self.stats.clone()
        }
    }

    // == Purge Expired ==
    /// Removes all entries that are no longer servable.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| !entry.is_servable(now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        self.assert_invariants();
        expired.len()
    }

    /// Returns the entry without recording an access.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Keys currently carrying `tag`.
    pub fn keys_for_tag(&self, tag: &str) -> HashSet<String> {
        self.tags.keys_for_tag(tag)
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    /// Drops `key` from the map, the tag index and the size total.
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            self.tags.remove(tag, key);
        }
        self.total_size_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn over_budget(&self, capacity: Capacity) -> bool {
        match capacity {
            Capacity::Entries(max) => self.entries.len() > max,
            Capacity::Bytes(max) => self.total_size_bytes > max,
        }
    }

    /// Evicts the least recently accessed entries (ties: oldest creation,
    /// then oldest write) until `capacity` holds. `protected` is skipped.
    fn enforce_capacity(&mut self, capacity: Capacity, protected: &str) {
        while self.over_budget(capacity) {
            let victim = self
                .entries
                .values()
                .filter(|entry| entry.key != protected)
                .min_by_key(|entry| (entry.last_accessed_at, entry.created_at, entry.sequence))
                .map(|entry| entry.key.clone());

            let Some(victim) = victim else {
                // Unreachable with a validated capacity: a lone entry always fits.
                debug_assert!(false, "over budget with nothing left to evict");
                break;
            };

            self.remove_entry(&victim);
            self.stats.record_eviction();
            debug!(key = %victim, "evicted least recently accessed entry");
        }
    }

    /// Checks tag index and size bookkeeping against the entries.
    ///
    /// A violation is a defect, so this panics rather than repairing.
    fn assert_invariants(&self) {
        if !cfg!(debug_assertions) {
            return;
        }

        for (tag, key) in self.tags.memberships() {
            let entry = self.entries.get(key);
            assert!(
                entry.is_some_and(|e| e.tags.contains(tag)),
                "tag index lists '{}' under '{}' but the store does not",
                key,
                tag
            );
        }
        for entry in self.entries.values() {
            assert!(entry.expires_at >= entry.created_at);
            for tag in &entry.tags {
                assert!(
                    self.tags.contains(tag, &entry.key),
                    "entry '{}' carries '{}' but is missing from the tag index",
                    entry.key,
                    tag
                );
            }
        }
        let summed: usize = self.entries.values().map(|e| e.size_bytes).sum();
        assert_eq!(summed, self.total_size_bytes, "size total drifted");
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::time::Duration;

    fn store_at(start_ms: u64) -> (CacheStore<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let store = CacheStore::new()
            .with_clock(clock.clone())
            .with_size_estimator(|v: &String| v.len());
        (store, clock)
    }

    fn ttl(ms: u64) -> CacheConfig {
        CacheConfig::with_ttl_ms(ms)
    }

    #[test]
    fn test_store_new() {
        let store: CacheStore<String> = CacheStore::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let (mut store, _) = store_at(0);

        store.set("key1", "value1".to_string(), &ttl(1000)).unwrap();

        assert_eq!(store.get("key1"), Lookup::Fresh("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (mut store, _) = store_at(0);
        assert_eq!(store.get("nonexistent"), Lookup::Miss);
        assert_eq!(store.stats().miss_count, 1);
    }

    #[test]
    fn test_ttl_fresh_then_miss() {
        let (mut store, clock) = store_at(0);
        store.set("user:1", "A".to_string(), &ttl(1000)).unwrap();

        clock.set(500);
        assert_eq!(store.get("user:1"), Lookup::Fresh("A".to_string()));

        clock.set(1500);
        assert_eq!(store.get("user:1"), Lookup::Miss);
        assert!(!store.has("user:1"));
    }

    #[test]
    fn test_stale_served_within_window() {
        let (mut store, clock) = store_at(0);
        let config = ttl(1000).stale_while_revalidate(Some(Duration::from_millis(2000)));
        store.set("user:1", "A".to_string(), &config).unwrap();

        clock.set(1500);
        assert_eq!(store.get("user:1"), Lookup::Stale("A".to_string()));
        assert!(store.has("user:1"));

        clock.set(3000);
        assert_eq!(store.get("user:1"), Lookup::Miss);
    }

    #[test]
    fn test_get_updates_last_accessed() {
        let (mut store, clock) = store_at(0);
        store.set("k", "v".to_string(), &ttl(10_000)).unwrap();

        clock.set(700);
        store.get("k");
        assert_eq!(store.peek("k").unwrap().last_accessed_at, 700);
    }

    #[test]
    fn test_has_does_not_touch_stats() {
        let (mut store, _) = store_at(0);
        store.set("k", "v".to_string(), &ttl(1000)).unwrap();

        assert!(store.has("k"));
        assert!(!store.has("other"));

        let stats = store.stats();
        assert_eq!(stats.hit_count, 0);
        assert_eq!(stats.miss_count, 0);
    }

    #[test]
    fn test_store_delete() {
        let (mut store, _) = store_at(0);
        store
            .set("key1", "value1".to_string(), &ttl(1000).with_tag("t"))
            .unwrap();

        assert!(store.delete("key1"));
        assert!(store.is_empty());
        assert!(store.keys_for_tag("t").is_empty());
        assert_eq!(store.get("key1"), Lookup::Miss);
    }

    #[test]
    fn test_store_delete_nonexistent() {
        let (mut store, _) = store_at(0);
        assert!(!store.delete("nonexistent"));
    }

    #[test]
    fn test_store_overwrite_replaces_tags_and_size() {
        let (mut store, clock) = store_at(0);
        store
            .set("key1", "aaaa".to_string(), &ttl(1000).with_tag("old"))
            .unwrap();

        clock.set(400);
        store
            .set("key1", "bb".to_string(), &ttl(1000).with_tag("new"))
            .unwrap();

        let entry = store.peek("key1").unwrap();
        assert_eq!(entry.created_at, 400);
        assert_eq!(entry.expires_at, 1400);
        assert!(store.keys_for_tag("old").is_empty());
        assert!(store.keys_for_tag("new").contains("key1"));

        let stats = store.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size_bytes, 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (mut store, _) = store_at(0);

        let result = store.set("k", "v".to_string(), &CacheConfig::new(Duration::ZERO));
        assert!(matches!(result, Err(CacheError::Configuration(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let (mut store, _) = store_at(0);
        let config = ttl(1000).with_max_bytes(8);

        store.set("small", "1234".to_string(), &config).unwrap();
        let result = store.set("big", "123456789".to_string(), &config);

        assert!(matches!(result, Err(CacheError::Configuration(_))));
        assert!(store.has("small"));
        assert!(!store.has("big"));
        assert_eq!(store.stats().eviction_count, 0);
    }

    #[test]
    fn test_oversized_overwrite_keeps_previous_value() {
        let (mut store, _) = store_at(0);
        let config = ttl(1000).with_max_bytes(4);

        store.set("k", "1234".to_string(), &config).unwrap();
        assert!(store.set("k", "12345".to_string(), &config).is_err());
        assert_eq!(store.get("k"), Lookup::Fresh("1234".to_string()));
    }

    #[test]
    fn test_store_lru_eviction() {
        let (mut store, clock) = store_at(0);
        let config = ttl(10_000).with_max_entries(3);

        for (i, key) in ["key1", "key2", "key3"].iter().enumerate() {
            clock.set(i as u64 * 10);
            store.set(*key, "v".to_string(), &config).unwrap();
        }

        // Cache is full, adding key4 should evict key1 (oldest access)
        clock.set(100);
        store.set("key4", "v".to_string(), &config).unwrap();

        assert_eq!(store.len(), 3);
        assert!(!store.has("key1"));
        assert!(store.has("key2"));
        assert!(store.has("key3"));
        assert!(store.has("key4"));
        assert_eq!(store.stats().eviction_count, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let (mut store, clock) = store_at(0);
        let config = ttl(10_000).with_max_entries(3);

        for (i, key) in ["key1", "key2", "key3"].iter().enumerate() {
            clock.set(i as u64 * 10);
            store.set(*key, "v".to_string(), &config).unwrap();
        }

        // Access key1 to make it most recently used
        clock.set(50);
        store.get("key1");

        clock.set(60);
        store.set("key4", "v".to_string(), &config).unwrap();

        assert!(store.has("key1"));
        assert!(!store.has("key2"));
    }

    #[test]
    fn test_eviction_access_ties_broken_by_creation() {
        let (mut store, clock) = store_at(0);
        let config = ttl(10_000).with_max_entries(2);

        store.set("b", "v".to_string(), &config).unwrap();
        clock.set(5);
        store.set("a", "v".to_string(), &config).unwrap();
        // Both last accessed at 5; b was created first
        let _ = store.get("b");

        clock.set(6);
        store.set("c", "v".to_string(), &config).unwrap();

        assert!(store.has("a"));
        assert!(!store.has("b"));
        assert!(store.has("c"));
    }

    #[test]
    fn test_eviction_full_ties_broken_by_write_order() {
        let (mut store, _) = store_at(0);
        let config = ttl(10_000).with_max_entries(2);

        // Same clock reading for every write
        store.set("a", "v".to_string(), &config).unwrap();
        store.set("b", "v".to_string(), &config).unwrap();
        store.set("c", "v".to_string(), &config).unwrap();

        assert!(!store.has("a"));
        assert!(store.has("b"));
        assert!(store.has("c"));
    }

    #[test]
    fn test_sub_millisecond_ttl_rejected_by_set() {
        let (mut store, _) = store_at(0);

        let config = CacheConfig::new(Duration::from_micros(500));
        let result = store.set("k", "v".to_string(), &config);

        assert!(matches!(result, Err(CacheError::Configuration(_))));
        assert!(store.is_empty());
        assert!(store.get("k").is_miss());
    }

    #[test]
    fn test_byte_budget_evicts_until_within() {
        let (mut store, clock) = store_at(0);
        let config = ttl(10_000).with_max_bytes(10);

        store.set("a", "1234".to_string(), &config).unwrap();
        clock.advance(1);
        store.set("b", "1234".to_string(), &config).unwrap();
        clock.advance(1);
        store.set("c", "12345678".to_string(), &config).unwrap();

        assert!(!store.has("a"));
        assert!(!store.has("b"));
        assert!(store.has("c"));
        assert_eq!(store.stats().total_size_bytes, 8);
        assert_eq!(store.stats().eviction_count, 2);
    }

    #[test]
    fn test_smaller_capacity_on_later_set_shrinks_store() {
        let (mut store, clock) = store_at(0);
        for i in 0..5 {
            clock.advance(1);
            store.set(format!("k{i}"), "v".to_string(), &ttl(10_000)).unwrap();
        }

        clock.advance(1);
        store
            .set("k5", "v".to_string(), &ttl(10_000).with_max_entries(2))
            .unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.has("k4"));
        assert!(store.has("k5"));
    }

    #[test]
    fn test_invalidate_by_tag() {
        let (mut store, _) = store_at(0);
        store
            .set("s1", "v".to_string(), &ttl(1000).with_tags(["research", "session:1"]))
            .unwrap();
        store
            .set("s2", "v".to_string(), &ttl(1000).with_tags(["research", "session:2"]))
            .unwrap();
        store
            .set("d1", "v".to_string(), &ttl(1000).with_tag("documents"))
            .unwrap();

        assert_eq!(store.invalidate_by_tag("research"), 2);

        assert!(!store.has("s1"));
        assert!(!store.has("s2"));
        assert!(store.has("d1"));
        assert!(store.keys_for_tag("research").is_empty());
        assert!(store.keys_for_tag("session:1").is_empty());
        assert_eq!(store.invalidate_by_tag("research"), 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (mut store, _) = store_at(0);
        store
            .set("k1", "v".to_string(), &ttl(1000).with_tag("t"))
            .unwrap();
        store.get("k1");
        store.get("missing");

        store.clear();

        let stats = store.stats();
        assert_eq!(stats, CacheStats::default());
        assert!(!store.has("k1"));
        assert!(store.keys_for_tag("t").is_empty());
    }

    #[test]
    fn test_stats_counts_stale_as_hit() {
        let (mut store, clock) = store_at(0);
        store
            .set("k", "v".to_string(), &ttl(100).stale_while_revalidate(None))
            .unwrap();

        clock.set(150);
        assert!(store.get("k").is_stale());

        let stats = store.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 0);
    }

    #[test]
    fn test_expired_entry_dropped_on_get() {
        let (mut store, clock) = store_at(0);
        store
            .set("k", "value".to_string(), &ttl(100).with_tag("t"))
            .unwrap();

        clock.set(100);
        assert!(store.peek("k").is_some());
        assert_eq!(store.get("k"), Lookup::Miss);
        assert!(store.peek("k").is_none());
        assert!(store.keys_for_tag("t").is_empty());
        assert_eq!(store.stats().eviction_count, 0);
    }

    #[test]
    fn test_store_purge_expired() {
        let (mut store, clock) = store_at(0);
        store.set("key1", "v".to_string(), &ttl(100)).unwrap();
        store.set("key2", "v".to_string(), &ttl(10_000)).unwrap();
        store
            .set("key3", "v".to_string(), &ttl(100).stale_while_revalidate(None))
            .unwrap();

        clock.set(500);

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.has("key2"));
        assert!(store.has("key3"));
    }

    #[test]
    fn test_json_store_sizes_by_serialized_length() {
        let mut store = CacheStore::json();
        store
            .set("k", serde_json::json!({"name": "A"}), &ttl(1000))
            .unwrap();
        assert_eq!(store.stats().total_size_bytes, r#"{"name":"A"}"#.len());
    }
}

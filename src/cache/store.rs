//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with category TTLs,
//! oldest-first eviction and lazy expiration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{AgeTracker, CacheEntry, CacheStats, Category, CategoryTable};
use crate::config::Config;

/// Store handle shared between coordinators and the sweep task.
pub type SharedStore = Arc<RwLock<CacheStore>>;

// == Cache Store ==
/// Category-scoped, TTL-bound response cache.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Keys grouped by category, so invalidation skips unrelated entries
    by_category: HashMap<Category, HashSet<String>>,
    /// Insertion order for eviction
    ages: AgeTracker,
    /// Category TTL configuration
    categories: CategoryTable,
    stats: CacheStats,
    /// Bumped by every category invalidation
    generations: HashMap<Category, u64>,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and category TTLs.
    pub fn new(max_entries: usize, categories: CategoryTable) -> Self {
        Self {
            entries: HashMap::new(),
            by_category: HashMap::new(),
            ages: AgeTracker::new(),
            categories,
            stats: CacheStats::new(),
            generations: HashMap::new(),
            max_entries,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_entries, CategoryTable::from_config(config))
    }

    /// Wraps the store for sharing across tasks.
    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Expired entries are removed and counted as misses. An entry filed
    /// under a different category is reported as a miss and left in place.
    pub fn get(&mut self, key: &str, category: &Category) -> Option<Value> {
        let now = Instant::now();
        let (expired, wrong_category) = match self.entries.get(key) {
            Some(entry) => (entry.is_expired_at(now), &entry.category != category),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if wrong_category {
            debug!("Key {} requested under category {} but filed elsewhere", key, category);
            self.stats.record_miss();
            return None;
        }

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Set ==
    /// Stores a value under a category.
    ///
    /// The effective TTL is `ttl_override`, else the category TTL, else the
    /// default TTL. A zero effective TTL means "do not cache" and the call is
    /// a no-op. Storing a new key into a full store first evicts the single
    /// globally-oldest entry.
    ///
    /// Returns whether the value was stored.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        category: &Category,
        value: Value,
        ttl_override: Option<Duration>,
    ) -> bool {
        let key = key.into();

        if !self.categories.contains(category) {
            debug!("Category {} not configured, using default TTL", category);
        }
        let ttl = ttl_override.unwrap_or_else(|| self.categories.ttl_for(category));
        if ttl.is_zero() {
            return false;
        }

        let is_overwrite = self.remove_entry(&key).is_some();

        if !is_overwrite && self.entries.len() >= self.max_entries {
            if let Some(evicted_key) = self.ages.evict_oldest() {
                debug!("Evicting oldest entry {}", evicted_key);
                self.remove_entry(&evicted_key);
                self.stats.record_eviction();
            }
        }

        self.by_category
            .entry(category.clone())
            .or_default()
            .insert(key.clone());
        self.ages.record(&key);
        self.entries
            .insert(key, CacheEntry::new(category.clone(), value, ttl));
        self.stats.set_total_entries(self.entries.len());
        true
    }

    // == Delete ==
    /// Removes an entry by key. Counts as an invalidation whether or not the
    /// key was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key).is_some();
        self.stats.record_invalidations(1);
        removed
    }

    // == Invalidate Category ==
    /// Removes every entry of `category` whose key matches `key_pattern`
    /// (all of them when no pattern is given).
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_category(&mut self, category: &Category, key_pattern: Option<&Regex>) -> usize {
        *self.generations.entry(category.clone()).or_default() += 1;

        let doomed: Vec<String> = match self.by_category.get(category) {
            Some(keys) => keys
                .iter()
                .filter(|key| key_pattern.map_or(true, |pattern| pattern.is_match(key)))
                .cloned()
                .collect(),
            None => return 0,
        };

        for key in &doomed {
            self.remove_entry(key);
        }

        let count = doomed.len();
        self.stats.record_invalidations(count as u64);
        count
    }

    /// Invalidation generation of `category`.
    ///
    /// A value fetched while the generation was `g` must not be stored once
    /// it has moved past `g`; see [`CacheStore::set_if_current`].
    pub fn generation(&self, category: &Category) -> u64 {
        self.generations.get(category).copied().unwrap_or(0)
    }

    /// Like [`CacheStore::set`], but a no-op returning false when `category`
    /// was invalidated since `generation` was read.
    pub fn set_if_current(
        &mut self,
        key: impl Into<String>,
        category: &Category,
        value: Value,
        generation: u64,
    ) -> bool {
        if self.generation(category) != generation {
            debug!("Dropping stale value for category {}", category);
            return false;
        }
        self.set(key, category, value, None)
    }

    // == Sweep ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }

        let count = expired_keys.len();
        self.stats.record_expirations(count as u64);
        count
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Drops every entry, keeping counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_category.clear();
        self.ages.clear();
        self.stats.set_total_entries(0);
    }

    pub fn knows_category(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    pub fn category_ttl(&self, category: &Category) -> Duration {
        self.categories.ttl_for(category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        if let Some(keys) = self.by_category.get_mut(&entry.category) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_category.remove(&entry.category);
            }
        }
        self.ages.remove(key);
        self.stats.set_total_entries(self.entries.len());
        Some(entry)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Category {
        Category::new("items")
    }

    fn users() -> Category {
        Category::new("users")
    }

    fn test_store(max_entries: usize) -> CacheStore {
        let categories = CategoryTable::new(Duration::from_secs(300))
            .with_category("items", Duration::from_millis(1_000))
            .with_category("users", Duration::from_secs(60))
            .with_category("metrics", Duration::ZERO);
        CacheStore::new(max_entries, categories)
    }

    #[test]
    fn test_store_new() {
        let store = test_store(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = test_store(100);

        assert!(store.set("items:list", &items(), json!([1, 2]), None));
        let value = store.get("items:list", &items());

        assert_eq!(value, Some(json!([1, 2])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent_is_miss() {
        let mut store = test_store(100);

        assert_eq!(store.get("nonexistent", &items()), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_get_wrong_category_is_miss() {
        let mut store = test_store(100);
        store.set("items:list", &items(), json!(1), None);

        assert_eq!(store.get("items:list", &users()), None);
        assert!(store.contains_key("items:list"));
        assert_eq!(store.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_category_ttl_scenario() {
        let mut store = test_store(100);
        store.set("k", &items(), json!("v"), None);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(store.get("k", &items()), Some(json!("v")));
        assert_eq!(store.stats().hits, 1);

        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert_eq!(store.get("k", &items()), None);

        let stats = store.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
        assert!(!store.contains_key("k"), "Expired entry should be removed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_reads_do_not_extend_ttl() {
        let mut store = test_store(100);
        store.set("k", &items(), json!("v"), None);

        for _ in 0..9 {
            tokio::time::advance(Duration::from_millis(100)).await;
            assert!(store.get("k", &items()).is_some());
        }

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(store.get("k", &items()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_override() {
        let mut store = test_store(100);
        store.set("k", &items(), json!("v"), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.get("k", &items()).is_some());
    }

    #[test]
    fn test_store_zero_ttl_does_not_cache() {
        let mut store = test_store(100);

        assert!(!store.set("metrics:daily", &Category::new("metrics"), json!(1), None));
        assert!(!store.set("k", &items(), json!(1), Some(Duration::ZERO)));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_unknown_category_uses_default_ttl() {
        let mut store = test_store(100);
        let unknown = Category::new("unknown");
        store.set("k", &unknown, json!(1), None);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(store.get("k", &unknown).is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k", &unknown).is_none());
    }

    #[test]
    fn test_store_delete() {
        let mut store = test_store(100);

        store.set("k", &items(), json!(1), None);
        assert!(store.delete("k"));
        assert!(!store.delete("k"));

        assert!(store.is_empty());
        assert_eq!(store.stats().invalidations, 2);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = test_store(100);

        store.set("k", &items(), json!("v1"), None);
        store.set("k", &items(), json!("v2"), None);

        assert_eq!(store.get("k", &items()), Some(json!("v2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_overwrite_moves_category() {
        let mut store = test_store(100);

        store.set("k", &items(), json!(1), None);
        store.set("k", &users(), json!(2), None);

        assert_eq!(store.invalidate_category(&items(), None), 0);
        assert_eq!(store.get("k", &users()), Some(json!(2)));
    }

    #[test]
    fn test_store_evicts_globally_oldest() {
        let mut store = test_store(3);

        store.set("items:1", &items(), json!(1), None);
        store.set("users:1", &users(), json!(2), None);
        store.set("items:2", &items(), json!(3), None);

        // Reads do not refresh age
        store.get("items:1", &items());

        store.set("users:2", &users(), json!(4), None);

        assert_eq!(store.len(), 3);
        assert!(!store.contains_key("items:1"));
        assert!(store.contains_key("users:1"));
        assert!(store.contains_key("items:2"));
        assert!(store.contains_key("users:2"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_overwrite_at_capacity_does_not_evict() {
        let mut store = test_store(2);

        store.set("a", &items(), json!(1), None);
        store.set("b", &items(), json!(2), None);
        store.set("a", &items(), json!(3), None);

        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 0);

        // "a" was re-stored, so "b" is now the oldest
        store.set("c", &items(), json!(4), None);
        assert!(!store.contains_key("b"));
        assert!(store.contains_key("a"));
    }

    #[test]
    fn test_invalidate_category() {
        let mut store = test_store(100);

        store.set("items:list", &items(), json!([]), None);
        store.set("items:detail:1", &items(), json!({}), None);
        store.set("users:me", &users(), json!({}), None);

        assert_eq!(store.invalidate_category(&items(), None), 2);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("users:me"));
        assert_eq!(store.stats().invalidations, 2);
    }

    #[test]
    fn test_invalidate_category_with_pattern() {
        let mut store = test_store(100);

        store.set("items:list", &items(), json!([]), None);
        store.set("items:detail:1", &items(), json!({}), None);
        store.set("items:detail:2", &items(), json!({}), None);

        let pattern = Regex::new("^items:detail:").unwrap();
        assert_eq!(store.invalidate_category(&items(), Some(&pattern)), 2);
        assert!(store.contains_key("items:list"));
    }

    #[test]
    fn test_invalidate_unknown_category() {
        let mut store = test_store(100);
        assert_eq!(store.invalidate_category(&Category::new("nope"), None), 0);
    }

    #[test]
    fn test_set_if_current_drops_values_from_before_invalidation() {
        let mut store = test_store(100);
        let before = store.generation(&items());

        // Invalidating an empty category still moves its generation
        store.invalidate_category(&items(), None);

        assert!(!store.set_if_current("items:list", &items(), json!([1]), before));
        assert!(!store.contains_key("items:list"));

        let now = store.generation(&items());
        assert_eq!(now, before + 1);
        assert!(store.set_if_current("items:list", &items(), json!([2]), now));
        assert_eq!(store.get("items:list", &items()), Some(json!([2])));

        // Other categories are unaffected
        assert_eq!(store.generation(&users()), 0);
        assert!(store.set_if_current("users:me", &users(), json!({}), 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sweep() {
        let mut store = test_store(100);

        store.set("items:1", &items(), json!(1), None);
        store.set("users:1", &users(), json!(2), None);

        tokio::time::advance(Duration::from_millis(1_100)).await;

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("users:1"));
        assert_eq!(store.stats().expirations, 1);
        // Sweeping does not touch hit/miss counters
        assert_eq!(store.stats().misses, 0);
    }

    #[test]
    fn test_store_clear() {
        let mut store = test_store(100);
        store.set("a", &items(), json!(1), None);
        store.set("b", &users(), json!(2), None);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.invalidate_category(&items(), None), 0);
    }

    #[test]
    fn test_store_stats() {
        let mut store = test_store(100);

        store.set("k", &items(), json!(1), None);
        store.get("k", &items());
        store.get("missing", &items());

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }
}

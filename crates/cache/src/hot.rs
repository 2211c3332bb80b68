use std::time::Duration;

use moka::sync::Cache;
use repodex_core::EmbeddingCacheEntry;

/// Volatile, size- and TTL-bounded hot tier. Eviction is tolerated: anything
/// dropped here is still recoverable from the cold tier.
pub struct HotCache {
  cache: Cache<String, EmbeddingCacheEntry>,
}

impl HotCache {
  /// `max_entries` bounds the tier by count; every entry expires
  /// `ttl_hours` after it was written, matching `cache_ttl_hours`.
  pub fn new(max_entries: u64, ttl_hours: u64) -> Self {
    let cache =
      Cache::builder().max_capacity(max_entries).time_to_live(Duration::from_secs(ttl_hours * 3600)).build();
    Self { cache }
  }

  pub fn get(&self, content_hash: &str) -> Option<EmbeddingCacheEntry> {
    self.cache.get(content_hash)
  }

  pub fn insert(&self, entry: EmbeddingCacheEntry) {
    self.cache.insert(entry.content_hash.clone(), entry);
  }

  pub fn len(&self) -> u64 {
    self.cache.entry_count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn clear(&self) {
    self.cache.invalidate_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(hash: &str) -> EmbeddingCacheEntry {
    EmbeddingCacheEntry::new(hash, vec![1.0, 2.0, 3.0], "model-a")
  }

  #[test]
  fn insert_and_get_round_trips() {
    let cache = HotCache::new(100, 168);
    cache.insert(entry("hash-a"));
    let fetched = cache.get("hash-a").unwrap();
    assert_eq!(fetched.embedding, vec![1.0, 2.0, 3.0]);
  }

  #[test]
  fn miss_returns_none() {
    let cache = HotCache::new(100, 168);
    assert!(cache.get("nonexistent").is_none());
  }

  #[test]
  fn clear_empties_cache() {
    let cache = HotCache::new(100, 168);
    cache.insert(entry("hash-a"));
    cache.insert(entry("hash-b"));
    cache.clear();
    assert!(cache.get("hash-a").is_none());
    assert!(cache.get("hash-b").is_none());
  }
}

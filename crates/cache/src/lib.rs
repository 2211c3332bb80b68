pub mod hot;

pub use hot::HotCache;

use std::sync::Arc;

use repodex_core::EmbeddingCacheEntry;
use store::RepoDb;
use tracing::{debug, warn};

/// Two-tier content-addressed embedding cache: a volatile hot tier (fast,
/// TTL-bounded, eviction tolerated) in front of the durable store (cold
/// tier, authoritative). Callers never see the tiering — only
/// [`EmbeddingCache::get`] and [`EmbeddingCache::get_or_create`].
pub struct EmbeddingCache {
  hot: HotCache,
  store: Arc<RepoDb>,
}

impl EmbeddingCache {
  pub fn new(store: Arc<RepoDb>, max_hot_entries: u64, cache_ttl_hours: u64) -> Self {
    Self { hot: HotCache::new(max_hot_entries, cache_ttl_hours), store }
  }

  /// Read-through lookup: hot hit returns immediately; hot miss falls
  /// through to the cold tier and, on hit, promotes into the hot tier.
  pub async fn get(&self, content_hash: &str) -> Option<Vec<f32>> {
    if let Some(entry) = self.hot.get(content_hash) {
      debug!(hash = content_hash, tier = "hot", "cache hit");
      return Some(entry.embedding);
    }

    match self.store.get_cache_entry(content_hash).await {
      Ok(Some(entry)) => {
        debug!(hash = content_hash, tier = "cold", "cache hit, promoting to hot tier");
        self.hot.insert(entry.clone());
        Some(entry.embedding)
      }
      Ok(None) => None,
      Err(err) => {
        warn!(hash = content_hash, error = %err, "cold tier lookup failed");
        None
      }
    }
  }

  /// Read-through-or-compute: on a miss in both tiers, calls `compute` to
  /// produce the embedding, then writes hot and cold (write-through).
  /// Failure in either tier is non-fatal as long as the other succeeds.
  pub async fn get_or_create(
    &self,
    content_hash: &str,
    model_id: &str,
    compute: impl FnOnce() -> Vec<f32>,
  ) -> Vec<f32> {
    if let Some(embedding) = self.get(content_hash).await {
      return embedding;
    }

    let embedding = compute();
    let fresh = EmbeddingCacheEntry::new(content_hash, embedding, model_id);

    match self.store.get_or_create_cache_entry(content_hash, || fresh.clone()).await {
      Ok((entry, was_created)) => {
        if was_created {
          debug!(hash = content_hash, "cache entry created in cold tier");
        }
        self.hot.insert(entry.clone());
        entry.embedding
      }
      Err(err) => {
        warn!(hash = content_hash, error = %err, "cold tier write failed, serving from hot tier only");
        self.hot.insert(fresh.clone());
        fresh.embedding
      }
    }
  }

  pub fn hot_tier_len(&self) -> u64 {
    self.hot.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use repodex_core::ProjectId;
  use std::path::Path;
  use tempfile::TempDir;

  async fn create_test_cache() -> (TempDir, EmbeddingCache) {
    let temp_dir = TempDir::new().unwrap();
    let project_id = ProjectId::from_path(Path::new("/test"));
    let db = RepoDb::open_at_path(project_id, temp_dir.path().join("test.lancedb"), 4).await.unwrap();
    let cache = EmbeddingCache::new(Arc::new(db), 100, 168);
    (temp_dir, cache)
  }

  #[tokio::test]
  async fn miss_on_empty_cache() {
    let (_temp, cache) = create_test_cache().await;
    assert!(cache.get("nonexistent").await.is_none());
  }

  #[tokio::test]
  async fn get_or_create_computes_once_then_hits_hot_tier() {
    let (_temp, cache) = create_test_cache().await;
    let mut calls = 0;
    let embedding = cache
      .get_or_create("hash-a", "model-a", || {
        calls += 1;
        vec![1.0, 2.0, 3.0, 4.0]
      })
      .await;
    assert_eq!(embedding, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(calls, 1);

    let cached = cache.get("hash-a").await.unwrap();
    assert_eq!(cached, vec![1.0, 2.0, 3.0, 4.0]);
  }

  #[tokio::test]
  async fn cold_hit_promotes_to_hot_tier() {
    let (_temp, cache) = create_test_cache().await;
    cache
      .store
      .get_or_create_cache_entry("hash-b", || EmbeddingCacheEntry::new("hash-b", vec![5.0, 6.0, 7.0, 8.0], "model-a"))
      .await
      .unwrap();
    assert_eq!(cache.hot_tier_len(), 0);

    let fetched = cache.get("hash-b").await.unwrap();
    assert_eq!(fetched, vec![5.0, 6.0, 7.0, 8.0]);
    assert_eq!(cache.hot_tier_len(), 1);
  }
}

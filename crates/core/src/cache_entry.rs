use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached embedding vector, keyed by content hash (see [`crate::hash::cache_key`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCacheEntry {
  pub content_hash: String,
  pub embedding: Vec<f32>,
  pub model_id: String,
  pub dimensions: u32,
  pub created_at: DateTime<Utc>,
  pub last_accessed_at: DateTime<Utc>,
  pub hit_count: u64,
}

impl EmbeddingCacheEntry {
  pub fn new(content_hash: impl Into<String>, embedding: Vec<f32>, model_id: impl Into<String>) -> Self {
    let dimensions = embedding.len() as u32;
    let now = Utc::now();
    Self {
      content_hash: content_hash.into(),
      embedding,
      model_id: model_id.into(),
      dimensions,
      created_at: now,
      last_accessed_at: now,
      hit_count: 0,
    }
  }

  /// Records a cache hit: bumps `hit_count` and refreshes `last_accessed_at`.
  pub fn record_hit(&mut self) {
    self.hit_count += 1;
    self.last_accessed_at = Utc::now();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_entry_derives_dimensions_from_vector_length() {
    let entry = EmbeddingCacheEntry::new("abc123", vec![0.1, 0.2, 0.3], "model-a");
    assert_eq!(entry.dimensions, 3);
    assert_eq!(entry.hit_count, 0);
  }

  #[test]
  fn record_hit_increments_counter() {
    let mut entry = EmbeddingCacheEntry::new("abc123", vec![0.1], "model-a");
    entry.record_hit();
    entry.record_hit();
    assert_eq!(entry.hit_count, 2);
  }
}

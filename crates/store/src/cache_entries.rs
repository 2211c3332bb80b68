use arrow_array::{
  Array, Float32Array, FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array,
  UInt64Array,
};
use arrow_schema::{DataType, Field};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use repodex_core::EmbeddingCacheEntry;
use std::sync::Arc;

use crate::batch_helpers::{from_timestamp_millis, get_i64, get_string, get_u64};
use crate::connection::{RepoDb, Result};
use crate::schema::embedding_cache_entries_schema;

impl RepoDb {
  /// Idempotent upsert: if a row already exists for `content_hash`, bumps its
  /// hit count and access time; otherwise inserts a fresh entry. Returns the
  /// stored entry and whether it was newly created.
  pub async fn get_or_create_cache_entry(
    &self,
    content_hash: &str,
    build: impl FnOnce() -> EmbeddingCacheEntry,
  ) -> Result<(EmbeddingCacheEntry, bool)> {
    if let Some(mut existing) = self.get_cache_entry(content_hash).await? {
      existing.record_hit();
      self.replace_cache_entry(&existing).await?;
      return Ok((existing, false));
    }

    let entry = build();
    self.replace_cache_entry(&entry).await?;
    Ok((entry, true))
  }

  pub async fn get_cache_entry(&self, content_hash: &str) -> Result<Option<EmbeddingCacheEntry>> {
    let table = self.embedding_cache_entries_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("content_hash = '{}'", content_hash.replace('\'', "''")))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_cache_entry(batch, 0)?));
      }
    }
    Ok(None)
  }

  async fn replace_cache_entry(&self, entry: &EmbeddingCacheEntry) -> Result<()> {
    let table = self.embedding_cache_entries_table().await?;
    let batch = cache_entry_to_batch(entry, self.vector_dim)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], embedding_cache_entries_schema(self.vector_dim));
    table.delete(&format!("content_hash = '{}'", entry.content_hash.replace('\'', "''"))).await?;
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }
}

fn cache_entry_to_batch(entry: &EmbeddingCacheEntry, vector_dim: usize) -> Result<RecordBatch> {
  let values = Float32Array::from(entry.embedding.clone());
  let field = Arc::new(Field::new("item", DataType::Float32, true));
  let embedding_array = FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values), None)?;

  let batch = RecordBatch::try_new(
    embedding_cache_entries_schema(vector_dim),
    vec![
      Arc::new(StringArray::from(vec![entry.content_hash.clone()])),
      Arc::new(embedding_array),
      Arc::new(StringArray::from(vec![entry.model_id.clone()])),
      Arc::new(UInt32Array::from(vec![entry.dimensions])),
      Arc::new(Int64Array::from(vec![entry.created_at.timestamp_millis()])),
      Arc::new(Int64Array::from(vec![entry.last_accessed_at.timestamp_millis()])),
      Arc::new(UInt64Array::from(vec![entry.hit_count])),
    ],
  )?;
  Ok(batch)
}

fn batch_to_cache_entry(batch: &RecordBatch, row: usize) -> Result<EmbeddingCacheEntry> {
  let embedding = batch
    .column_by_name("embedding")
    .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
    .map(|a| {
      let values = a.value(row);
      let floats = values.as_any().downcast_ref::<Float32Array>().expect("embedding column is Float32");
      floats.values().to_vec()
    })
    .ok_or_else(|| crate::connection::DbError::NotFound("column embedding".to_string()))?;

  Ok(EmbeddingCacheEntry {
    content_hash: get_string(batch, row, "content_hash")?,
    embedding,
    model_id: get_string(batch, row, "model_id")?,
    dimensions: crate::batch_helpers::get_u32(batch, row, "dimensions")?,
    created_at: from_timestamp_millis(get_i64(batch, row, "created_at")?)?,
    last_accessed_at: from_timestamp_millis(get_i64(batch, row, "last_accessed_at")?)?,
    hit_count: get_u64(batch, row, "hit_count")?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;
  use tempfile::TempDir;

  async fn create_test_db() -> (TempDir, RepoDb) {
    let temp_dir = TempDir::new().unwrap();
    let project_id = repodex_core::ProjectId::from_path(Path::new("/test"));
    let db = RepoDb::open_at_path(project_id, temp_dir.path().join("test.lancedb"), 4).await.unwrap();
    (temp_dir, db)
  }

  #[tokio::test]
  async fn get_or_create_inserts_on_first_call() {
    let (_temp, db) = create_test_db().await;
    let (entry, created) = db
      .get_or_create_cache_entry("hash-a", || EmbeddingCacheEntry::new("hash-a", vec![0.1, 0.2, 0.3, 0.4], "model-a"))
      .await
      .unwrap();
    assert!(created);
    assert_eq!(entry.hit_count, 0);
  }

  #[tokio::test]
  async fn get_or_create_records_hit_on_second_call() {
    let (_temp, db) = create_test_db().await;
    db.get_or_create_cache_entry("hash-b", || EmbeddingCacheEntry::new("hash-b", vec![0.1, 0.2, 0.3, 0.4], "model-a"))
      .await
      .unwrap();

    let (entry, created) = db
      .get_or_create_cache_entry("hash-b", || EmbeddingCacheEntry::new("hash-b", vec![0.1, 0.2, 0.3, 0.4], "model-a"))
      .await
      .unwrap();
    assert!(!created);
    assert_eq!(entry.hit_count, 1);
  }

  #[tokio::test]
  async fn embedding_vector_round_trips() {
    let (_temp, db) = create_test_db().await;
    db.get_or_create_cache_entry("hash-c", || EmbeddingCacheEntry::new("hash-c", vec![1.0, 2.0, 3.0, 4.0], "model-a"))
      .await
      .unwrap();

    let fetched = db.get_cache_entry("hash-c").await.unwrap().unwrap();
    assert_eq!(fetched.embedding, vec![1.0, 2.0, 3.0, 4.0]);
  }
}

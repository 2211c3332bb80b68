use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Schema for the jobs table.
pub fn jobs_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("repository_root", DataType::Utf8, false),
    Field::new("job_type", DataType::Utf8, false),
    Field::new("status", DataType::Utf8, false),
    Field::new("include_patterns", DataType::Utf8, false), // JSON array
    Field::new("exclude_patterns", DataType::Utf8, false), // JSON array
    Field::new("force_reindex", DataType::Boolean, false),
    Field::new("total_files", DataType::UInt64, false),
    Field::new("processed_files", DataType::UInt64, false),
    Field::new("failed_files", DataType::UInt64, false),
    Field::new("skipped_files", DataType::UInt64, false),
    Field::new("created_at", DataType::Int64, false),
    Field::new("started_at", DataType::Int64, true),
    Field::new("completed_at", DataType::Int64, true),
    Field::new("processing_order", DataType::Utf8, false), // JSON array
    Field::new("last_processed_file", DataType::Utf8, true),
    Field::new("checkpoint", DataType::Utf8, true), // JSON object
    Field::new("error_message", DataType::Utf8, true),
  ]))
}

/// Schema for the file_states table, keyed by (job_id, path).
pub fn file_states_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("job_id", DataType::Utf8, false),
    Field::new("path", DataType::Utf8, false),
    Field::new("status", DataType::Utf8, false),
    Field::new("content_hash", DataType::Utf8, true),
    Field::new("size_bytes", DataType::UInt64, false),
    Field::new("entities_extracted", DataType::UInt64, false),
    Field::new("embeddings_generated", DataType::UInt64, false),
    Field::new("processing_duration_seconds", DataType::Float64, true),
    Field::new("error_kind", DataType::Utf8, true),
    Field::new("error_message", DataType::Utf8, true),
    Field::new("retry_count", DataType::UInt32, false),
    Field::new("skip_reason", DataType::Utf8, true),
    Field::new("last_stage", DataType::Utf8, true),
    Field::new("last_offset", DataType::UInt64, false),
    Field::new("started_at", DataType::Int64, true),
    Field::new("completed_at", DataType::Int64, true),
  ]))
}

/// Schema for the repository_snapshots table.
pub fn repository_snapshots_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("job_id", DataType::Utf8, false),
    Field::new("repository_root", DataType::Utf8, false),
    Field::new("total_files", DataType::UInt64, false),
    Field::new("processed_files", DataType::UInt64, false),
    Field::new("failed_files", DataType::UInt64, false),
    Field::new("skipped_files", DataType::UInt64, false),
    Field::new("success_rate", DataType::Float64, true),
    Field::new("average_entities_per_file", DataType::Float64, false),
    Field::new("average_processing_duration_seconds", DataType::Float64, false),
    Field::new("language_distribution", DataType::Utf8, false), // JSON object
    Field::new("created_at", DataType::Int64, false),
  ]))
}

/// Schema for the embedding_cache_entries table, keyed by content_hash.
pub fn embedding_cache_entries_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("content_hash", DataType::Utf8, false),
    Field::new(
      "embedding",
      DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
      false,
    ),
    Field::new("model_id", DataType::Utf8, false),
    Field::new("dimensions", DataType::UInt32, false),
    Field::new("created_at", DataType::Int64, false),
    Field::new("last_accessed_at", DataType::Int64, false),
    Field::new("hit_count", DataType::UInt64, false),
  ]))
}

/// Schema for the dead_letter_entries table.
pub fn dead_letter_entries_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("job_id", DataType::Utf8, false),
    Field::new("path", DataType::Utf8, false),
    Field::new("stage", DataType::Utf8, false),
    Field::new("error_kind", DataType::Utf8, false),
    Field::new("error_message", DataType::Utf8, false),
    Field::new("retry_history", DataType::Utf8, false), // JSON array
    Field::new("resolved", DataType::Boolean, false),
    Field::new("created_at", DataType::Int64, false),
  ]))
}

/// Default vector dimensions for the reference embedding model.
pub const DEFAULT_VECTOR_DIM: usize = 1024;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_jobs_schema() {
    let schema = jobs_schema();
    assert!(schema.field_with_name("id").is_ok());
    assert!(schema.field_with_name("processing_order").is_ok());
  }

  #[test]
  fn test_file_states_schema() {
    let schema = file_states_schema();
    assert!(schema.field_with_name("job_id").is_ok());
    assert!(schema.field_with_name("path").is_ok());
  }

  #[test]
  fn test_embedding_cache_entries_schema() {
    let schema = embedding_cache_entries_schema(768);
    assert!(schema.field_with_name("content_hash").is_ok());
    assert!(schema.field_with_name("embedding").is_ok());
  }

  #[test]
  fn test_dead_letter_entries_schema() {
    let schema = dead_letter_entries_schema();
    assert!(schema.field_with_name("retry_history").is_ok());
  }
}

use arrow_array::{Array, Float64Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use repodex_core::RepositorySnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::batch_helpers::{from_timestamp_millis, get_f64, get_i64, get_string, get_u64};
use crate::connection::{DbError, RepoDb, Result};
use crate::schema::repository_snapshots_schema;

impl RepoDb {
  /// Writes a snapshot row. Snapshots are insert-only: one is created per
  /// successfully finalized job and never updated afterwards.
  pub async fn insert_snapshot(&self, snapshot: &RepositorySnapshot) -> Result<()> {
    let table = self.repository_snapshots_table().await?;
    let batch = snapshot_to_batch(snapshot)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], repository_snapshots_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn get_snapshot_for_job(&self, job_id: Uuid) -> Result<Option<RepositorySnapshot>> {
    let table = self.repository_snapshots_table().await?;
    let results: Vec<RecordBatch> =
      table.query().only_if(format!("job_id = '{job_id}'")).execute().await?.try_collect().await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_snapshot(batch, 0)?));
      }
    }
    Ok(None)
  }

  /// Most recent snapshots for a repository root, newest first.
  pub async fn list_snapshots(&self, repository_root: &str, limit: usize) -> Result<Vec<RepositorySnapshot>> {
    let table = self.repository_snapshots_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("repository_root = '{}'", repository_root.replace('\'', "''")))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut snapshots = Vec::new();
    for batch in &results {
      for row in 0..batch.num_rows() {
        snapshots.push(batch_to_snapshot(batch, row)?);
      }
    }
    snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    snapshots.truncate(limit);
    Ok(snapshots)
  }
}

fn snapshot_to_batch(snapshot: &RepositorySnapshot) -> Result<RecordBatch> {
  let batch = RecordBatch::try_new(
    repository_snapshots_schema(),
    vec![
      Arc::new(StringArray::from(vec![snapshot.id.to_string()])),
      Arc::new(StringArray::from(vec![snapshot.job_id.to_string()])),
      Arc::new(StringArray::from(vec![snapshot.repository_root.clone()])),
      Arc::new(UInt64Array::from(vec![snapshot.total_files])),
      Arc::new(UInt64Array::from(vec![snapshot.processed_files])),
      Arc::new(UInt64Array::from(vec![snapshot.failed_files])),
      Arc::new(UInt64Array::from(vec![snapshot.skipped_files])),
      Arc::new(Float64Array::from(vec![snapshot.success_rate])),
      Arc::new(Float64Array::from(vec![snapshot.average_entities_per_file])),
      Arc::new(Float64Array::from(vec![snapshot.average_processing_duration_seconds])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&snapshot.language_distribution)?])),
      Arc::new(arrow_array::Int64Array::from(vec![snapshot.created_at.timestamp_millis()])),
    ],
  )?;
  Ok(batch)
}

fn batch_to_snapshot(batch: &RecordBatch, row: usize) -> Result<RepositorySnapshot> {
  let language_distribution: HashMap<String, u64> =
    serde_json::from_str(&get_string(batch, row, "language_distribution")?)?;

  Ok(RepositorySnapshot {
    id: get_string(batch, row, "id")?.parse::<Uuid>().map_err(|e| DbError::NotFound(e.to_string()))?,
    job_id: get_string(batch, row, "job_id")?.parse::<Uuid>().map_err(|e| DbError::NotFound(e.to_string()))?,
    repository_root: get_string(batch, row, "repository_root")?,
    total_files: get_u64(batch, row, "total_files")?,
    processed_files: get_u64(batch, row, "processed_files")?,
    failed_files: get_u64(batch, row, "failed_files")?,
    skipped_files: get_u64(batch, row, "skipped_files")?,
    success_rate: crate::batch_helpers::get_optional_f64(batch, row, "success_rate"),
    average_entities_per_file: get_f64(batch, row, "average_entities_per_file")?,
    average_processing_duration_seconds: get_f64(batch, row, "average_processing_duration_seconds")?,
    language_distribution,
    created_at: from_timestamp_millis(get_i64(batch, row, "created_at")?)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use repodex_core::{Job, JobSpec, JobType};
  use std::path::Path;
  use tempfile::TempDir;

  async fn create_test_db() -> (TempDir, RepoDb) {
    let temp_dir = TempDir::new().unwrap();
    let project_id = repodex_core::ProjectId::from_path(Path::new("/test"));
    let db = RepoDb::open_at_path(project_id, temp_dir.path().join("test.lancedb"), 8).await.unwrap();
    (temp_dir, db)
  }

  fn sample_job() -> Job {
    Job::new(JobSpec {
      repository_root: "/repo".to_string(),
      job_type: JobType::Full,
      include_patterns: vec![],
      exclude_patterns: vec![],
      force_reindex: false,
    })
  }

  #[tokio::test]
  async fn insert_and_get_round_trips() {
    let (_temp, db) = create_test_db().await;
    let mut job = sample_job();
    job.processed_files = 10;
    let mut languages = HashMap::new();
    languages.insert("python".to_string(), 7u64);
    let snapshot = RepositorySnapshot::from_job(&job, 50, 20.0, languages);
    db.insert_snapshot(&snapshot).await.unwrap();

    let fetched = db.get_snapshot_for_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.average_entities_per_file, 5.0);
    assert_eq!(fetched.language_distribution.get("python"), Some(&7));
  }

  #[tokio::test]
  async fn list_snapshots_orders_newest_first() {
    let (_temp, db) = create_test_db().await;
    let job_a = sample_job();
    let snapshot_a = RepositorySnapshot::from_job(&job_a, 0, 0.0, HashMap::new());
    db.insert_snapshot(&snapshot_a).await.unwrap();

    let job_b = sample_job();
    let mut snapshot_b = RepositorySnapshot::from_job(&job_b, 0, 0.0, HashMap::new());
    snapshot_b.created_at = snapshot_a.created_at + chrono::Duration::seconds(1);
    db.insert_snapshot(&snapshot_b).await.unwrap();

    let snapshots = db.list_snapshots("/repo", 10).await.unwrap();
    assert_eq!(snapshots[0].id, snapshot_b.id);
  }
}

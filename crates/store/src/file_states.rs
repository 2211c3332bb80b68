use arrow_array::{
  Array, Float64Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array, UInt64Array,
};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use repodex_core::{ErrorKind, ErrorKindTag, FileState, FileStatus, Stage};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::batch_helpers::{
  from_timestamp_millis, get_optional_f64, get_optional_string, get_string, get_u32, get_u64,
};
use crate::connection::{DbError, RepoDb, Result};
use crate::schema::file_states_schema;

impl RepoDb {
  /// Inserts or replaces the file_state row for `(job_id, path)`. Never
  /// regresses a terminal status (`Completed`/`Failed`/`Skipped`) back to a
  /// non-terminal one; callers that need to retry a failed file should go
  /// through [`RepoDb::record_error`] or construct a fresh pending state.
  pub async fn upsert_file_state(&self, state: &FileState) -> Result<()> {
    if let Some(existing) = self.get_file_state(state.job_id, &state.path).await? {
      if is_terminal(existing.status) && !is_terminal(state.status) {
        return Err(DbError::Conflict(format!(
          "cannot regress file_state for {} from terminal status {:?} to {:?}",
          state.path, existing.status, state.status
        )));
      }
    }

    let table = self.file_states_table().await?;
    let batch = file_state_to_batch(state)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], file_states_schema());
    table
      .delete(&format!("job_id = '{}' AND path = '{}'", state.job_id, escape(&state.path)))
      .await?;
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// Records a failed attempt: increments `retry_count` and marks the file
  /// failed with the given error.
  pub async fn record_error(&self, job_id: Uuid, path: &str, error_kind: ErrorKind, message: String) -> Result<()> {
    let mut state = self
      .get_file_state(job_id, path)
      .await?
      .unwrap_or_else(|| FileState::pending(job_id, path.to_string()));
    state.mark_failed(error_kind, message);
    self.upsert_file_state(&state).await
  }

  /// Resets a FAILED file_state back to PENDING so the orchestrator can
  /// reprocess it, preserving `retry_count`. The one sanctioned regression
  /// from a terminal status — [`Self::upsert_file_state`] rejects this on
  /// purpose so only a caller that has already checked `retry_count` against
  /// the job's retry budget can take it. Returns `None` if no state exists
  /// yet, and leaves a non-FAILED state untouched.
  pub async fn retry_file_state(&self, job_id: Uuid, path: &str) -> Result<Option<FileState>> {
    let Some(mut state) = self.get_file_state(job_id, path).await? else { return Ok(None) };
    if state.status != FileStatus::Failed {
      return Ok(Some(state));
    }
    state.reset_for_retry();

    let table = self.file_states_table().await?;
    let batch = file_state_to_batch(&state)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], file_states_schema());
    table
      .delete(&format!("job_id = '{}' AND path = '{}'", state.job_id, escape(&state.path)))
      .await?;
    table.add(Box::new(batches)).execute().await?;

    Ok(Some(state))
  }

  pub async fn get_file_state(&self, job_id: Uuid, path: &str) -> Result<Option<FileState>> {
    let table = self.file_states_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("job_id = '{job_id}' AND path = '{}'", escape(path)))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_file_state(batch, 0)?));
      }
    }
    Ok(None)
  }

  /// Most recent COMPLETED file_state for `path` across every prior job run
  /// against `repository_root`. A fresh job has no file_state of its own for
  /// a path it has never touched, so "completed in an earlier run" has to be
  /// read cross-job, mirroring [`crate::jobs`]'s per-repository job scan.
  pub async fn find_latest_completed_file_state(&self, repository_root: &str, path: &str) -> Result<Option<FileState>> {
    let jobs = self.list_recent_jobs(usize::MAX).await?;
    let mut latest: Option<FileState> = None;

    for job in jobs {
      if job.repository_root != repository_root {
        continue;
      }
      let Some(state) = self.get_file_state(job.id, path).await? else { continue };
      if state.status != FileStatus::Completed {
        continue;
      }
      if latest.as_ref().is_none_or(|current| state.completed_at > current.completed_at) {
        latest = Some(state);
      }
    }

    Ok(latest)
  }

  /// Lists file states for a job filtered by status, most recently started
  /// first, capped at `limit`.
  pub async fn list_files_by_status(&self, job_id: Uuid, status: FileStatus, limit: usize) -> Result<Vec<FileState>> {
    let table = self.file_states_table().await?;
    let results: Vec<RecordBatch> =
      table.query().only_if(format!("job_id = '{job_id}'")).execute().await?.try_collect().await?;

    let mut states = Vec::new();
    for batch in &results {
      for row in 0..batch.num_rows() {
        let state = batch_to_file_state(batch, row)?;
        if state.status == status {
          states.push(state);
        }
      }
    }
    states.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    states.truncate(limit);
    Ok(states)
  }
}

fn is_terminal(status: FileStatus) -> bool {
  matches!(status, FileStatus::Completed | FileStatus::Failed | FileStatus::Skipped)
}

fn escape(value: &str) -> String {
  value.replace('\'', "''")
}

fn file_state_to_batch(state: &FileState) -> Result<RecordBatch> {
  let batch = RecordBatch::try_new(
    file_states_schema(),
    vec![
      Arc::new(StringArray::from(vec![state.job_id.to_string()])),
      Arc::new(StringArray::from(vec![state.path.clone()])),
      Arc::new(StringArray::from(vec![state.status.as_str().to_string()])),
      Arc::new(StringArray::from(vec![state.content_hash.clone()])),
      Arc::new(UInt64Array::from(vec![state.size_bytes])),
      Arc::new(UInt64Array::from(vec![state.entities_extracted])),
      Arc::new(UInt64Array::from(vec![state.embeddings_generated])),
      Arc::new(Float64Array::from(vec![state.processing_duration_seconds])),
      Arc::new(StringArray::from(vec![state.error_kind.as_ref().map(|k| k.as_str().to_string())])),
      Arc::new(StringArray::from(vec![state.error_message.clone()])),
      Arc::new(UInt32Array::from(vec![state.retry_count])),
      Arc::new(StringArray::from(vec![state.skip_reason.clone()])),
      Arc::new(StringArray::from(vec![state.last_stage.map(|s| s.as_str().to_string())])),
      Arc::new(UInt64Array::from(vec![state.last_offset])),
      Arc::new(arrow_array::Int64Array::from(vec![state.started_at.map(|t| t.timestamp_millis())])),
      Arc::new(arrow_array::Int64Array::from(vec![state.completed_at.map(|t| t.timestamp_millis())])),
    ],
  )?;
  Ok(batch)
}

fn batch_to_file_state(batch: &RecordBatch, row: usize) -> Result<FileState> {
  let job_id = get_string(batch, row, "job_id")?
    .parse::<Uuid>()
    .map_err(|e| DbError::NotFound(e.to_string()))?;
  let status =
    FileStatus::from_str(&get_string(batch, row, "status")?).map_err(DbError::NotFound)?;
  let error_kind = get_optional_string(batch, row, "error_kind")
    .map(|s| ErrorKindTag::from_str(&s).map_err(DbError::NotFound))
    .transpose()?;
  let last_stage = get_optional_string(batch, row, "last_stage")
    .map(|s| Stage::from_str(&s).map_err(DbError::NotFound))
    .transpose()?;

  Ok(FileState {
    job_id,
    path: get_string(batch, row, "path")?,
    status,
    content_hash: get_optional_string(batch, row, "content_hash"),
    size_bytes: get_u64(batch, row, "size_bytes")?,
    entities_extracted: get_u64(batch, row, "entities_extracted")?,
    embeddings_generated: get_u64(batch, row, "embeddings_generated")?,
    processing_duration_seconds: get_optional_f64(batch, row, "processing_duration_seconds"),
    error_kind,
    error_message: get_optional_string(batch, row, "error_message"),
    retry_count: get_u32(batch, row, "retry_count")?,
    skip_reason: get_optional_string(batch, row, "skip_reason"),
    last_stage,
    last_offset: get_u64(batch, row, "last_offset")?,
    started_at: crate::batch_helpers::get_optional_i64(batch, row, "started_at")
      .map(from_timestamp_millis)
      .transpose()?,
    completed_at: crate::batch_helpers::get_optional_i64(batch, row, "completed_at")
      .map(from_timestamp_millis)
      .transpose()?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use repodex_core::ErrorKind;
  use std::path::Path;
  use tempfile::TempDir;

  async fn create_test_db() -> (TempDir, RepoDb) {
    let temp_dir = TempDir::new().unwrap();
    let project_id = repodex_core::ProjectId::from_path(Path::new("/test"));
    let db = RepoDb::open_at_path(project_id, temp_dir.path().join("test.lancedb"), 8).await.unwrap();
    (temp_dir, db)
  }

  #[tokio::test]
  async fn upsert_and_get_round_trips() {
    let (_temp, db) = create_test_db().await;
    let job_id = Uuid::now_v7();
    let state = FileState::pending(job_id, "src/main.rs".to_string());
    db.upsert_file_state(&state).await.unwrap();

    let fetched = db.get_file_state(job_id, "src/main.rs").await.unwrap().unwrap();
    assert_eq!(fetched.status, FileStatus::Pending);
  }

  #[tokio::test]
  async fn upsert_rejects_regression_from_terminal_status() {
    let (_temp, db) = create_test_db().await;
    let job_id = Uuid::now_v7();
    let mut state = FileState::pending(job_id, "src/main.rs".to_string());
    state.mark_completed(3, 1);
    db.upsert_file_state(&state).await.unwrap();

    let mut regressed = state.clone();
    regressed.status = FileStatus::Processing;
    let result = db.upsert_file_state(&regressed).await;
    assert!(matches!(result, Err(DbError::Conflict(_))));
  }

  #[tokio::test]
  async fn record_error_increments_retry_count() {
    let (_temp, db) = create_test_db().await;
    let job_id = Uuid::now_v7();
    let state = FileState::pending(job_id, "src/lib.rs".to_string());
    db.upsert_file_state(&state).await.unwrap();

    db.record_error(job_id, "src/lib.rs", ErrorKind::Internal, "boom".into()).await.unwrap();

    let fetched = db.get_file_state(job_id, "src/lib.rs").await.unwrap().unwrap();
    assert_eq!(fetched.status, FileStatus::Failed);
    assert_eq!(fetched.retry_count, 1);
  }

  #[tokio::test]
  async fn retry_file_state_resets_failed_to_pending() {
    let (_temp, db) = create_test_db().await;
    let job_id = Uuid::now_v7();
    db.record_error(job_id, "src/lib.rs", ErrorKind::Internal, "boom".into()).await.unwrap();

    let retried = db.retry_file_state(job_id, "src/lib.rs").await.unwrap().unwrap();
    assert_eq!(retried.status, FileStatus::Pending);
    assert_eq!(retried.retry_count, 1);

    let fetched = db.get_file_state(job_id, "src/lib.rs").await.unwrap().unwrap();
    assert_eq!(fetched.status, FileStatus::Pending);
  }

  #[tokio::test]
  async fn retry_file_state_is_noop_for_non_failed_state() {
    let (_temp, db) = create_test_db().await;
    let job_id = Uuid::now_v7();
    let mut completed = FileState::pending(job_id, "a.rs".to_string());
    completed.mark_completed(1, 1);
    db.upsert_file_state(&completed).await.unwrap();

    let result = db.retry_file_state(job_id, "a.rs").await.unwrap().unwrap();
    assert_eq!(result.status, FileStatus::Completed);
  }

  #[tokio::test]
  async fn find_latest_completed_file_state_is_scoped_across_jobs_by_repository_root() {
    let (_temp, db) = create_test_db().await;

    let job_a = repodex_core::Job::new(repodex_core::JobSpec {
      repository_root: "/repo-a".to_string(),
      job_type: repodex_core::JobType::Full,
      include_patterns: vec![],
      exclude_patterns: vec![],
      force_reindex: false,
    });
    db.create_job(&job_a).await.unwrap();
    let mut state = FileState::pending(job_a.id, "src/lib.rs".to_string());
    state.content_hash = Some("hash-1".to_string());
    state.mark_completed(1, 1);
    db.upsert_file_state(&state).await.unwrap();

    let job_b = repodex_core::Job::new(repodex_core::JobSpec {
      repository_root: "/repo-b".to_string(),
      job_type: repodex_core::JobType::Full,
      include_patterns: vec![],
      exclude_patterns: vec![],
      force_reindex: false,
    });
    db.create_job(&job_b).await.unwrap();

    let found = db.find_latest_completed_file_state("/repo-a", "src/lib.rs").await.unwrap();
    assert_eq!(found.unwrap().content_hash.as_deref(), Some("hash-1"));

    let not_found = db.find_latest_completed_file_state("/repo-b", "src/lib.rs").await.unwrap();
    assert!(not_found.is_none());
  }

  #[tokio::test]
  async fn list_files_by_status_filters() {
    let (_temp, db) = create_test_db().await;
    let job_id = Uuid::now_v7();
    let mut completed = FileState::pending(job_id, "a.rs".to_string());
    completed.mark_completed(1, 1);
    db.upsert_file_state(&completed).await.unwrap();
    db.upsert_file_state(&FileState::pending(job_id, "b.rs".to_string())).await.unwrap();

    let pending = db.list_files_by_status(job_id, FileStatus::Pending, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].path, "b.rs");
  }
}

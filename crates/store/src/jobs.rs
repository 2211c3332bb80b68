use arrow_array::{
  Array, BooleanArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array,
};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use repodex_core::{Checkpoint, Job, JobStatus, JobType};
use std::sync::Arc;
use uuid::Uuid;

use crate::batch_helpers::{from_timestamp_millis, get_bool, get_i64, get_optional_i64, get_string, get_u64};
use crate::connection::{DbError, RepoDb, Result};
use crate::schema::jobs_schema;

impl RepoDb {
  /// Inserts a new job row. Fails with a store-level conflict error if a job
  /// with the same id already exists (ids are UUIDv7, so this should only
  /// happen on accidental reuse).
  pub async fn create_job(&self, job: &Job) -> Result<Uuid> {
    let table = self.jobs_table().await?;
    let batch = job_to_batch(job)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], jobs_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(job.id)
  }

  /// Compare-and-set status transition. Returns `false` without writing if
  /// the job's current status does not match `from_status`. The read, check,
  /// and write are serialized behind `transition_lock` so two concurrent
  /// callers racing on the same job id can't both observe a matching
  /// `from_status` and stomp on each other's write.
  pub async fn transition_job(
    &self,
    id: Uuid,
    from_status: JobStatus,
    to_status: JobStatus,
    patch: impl FnOnce(&mut Job),
  ) -> Result<bool> {
    let _guard = self.transition_lock.lock().await;

    let mut job = match self.get_job(id).await? {
      Some(job) => job,
      None => return Ok(false),
    };
    if job.status != from_status {
      return Ok(false);
    }
    job.status = to_status;
    patch(&mut job);
    self.replace_job(&job).await?;
    Ok(true)
  }

  /// Overwrites the full job row. Used for progress updates and by
  /// `transition_job` after a successful compare-and-set.
  pub async fn replace_job(&self, job: &Job) -> Result<()> {
    let table = self.jobs_table().await?;
    let batch = job_to_batch(job)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], jobs_schema());
    table.delete(&format!("id = '{}'", job.id)).await?;
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
    let table = self.jobs_table().await?;
    let results: Vec<RecordBatch> =
      table.query().only_if(format!("id = '{id}'")).execute().await?.try_collect().await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_job(batch, 0)?));
      }
    }
    Ok(None)
  }

  /// Most recently created jobs, newest first.
  pub async fn list_recent_jobs(&self, limit: usize) -> Result<Vec<Job>> {
    let table = self.jobs_table().await?;
    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut jobs = Vec::new();
    for batch in &results {
      for row in 0..batch.num_rows() {
        jobs.push(batch_to_job(batch, row)?);
      }
    }
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    jobs.truncate(limit);
    Ok(jobs)
  }
}

fn job_to_batch(job: &Job) -> Result<RecordBatch> {
  let checkpoint_json = match &job.checkpoint {
    Some(checkpoint) => Some(serde_json::to_string(checkpoint)?),
    None => None,
  };

  let batch = RecordBatch::try_new(
    jobs_schema(),
    vec![
      Arc::new(StringArray::from(vec![job.id.to_string()])),
      Arc::new(StringArray::from(vec![job.repository_root.clone()])),
      Arc::new(StringArray::from(vec![job.job_type.as_str().to_string()])),
      Arc::new(StringArray::from(vec![job.status.as_str().to_string()])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&job.include_patterns)?])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&job.exclude_patterns)?])),
      Arc::new(BooleanArray::from(vec![job.force_reindex])),
      Arc::new(UInt64Array::from(vec![job.total_files])),
      Arc::new(UInt64Array::from(vec![job.processed_files])),
      Arc::new(UInt64Array::from(vec![job.failed_files])),
      Arc::new(UInt64Array::from(vec![job.skipped_files])),
      Arc::new(Int64Array::from(vec![job.created_at.timestamp_millis()])),
      Arc::new(Int64Array::from(vec![job.started_at.map(|t| t.timestamp_millis())])),
      Arc::new(Int64Array::from(vec![job.completed_at.map(|t| t.timestamp_millis())])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&job.processing_order)?])),
      Arc::new(StringArray::from(vec![job.last_processed_file.clone()])),
      Arc::new(StringArray::from(vec![checkpoint_json])),
      Arc::new(StringArray::from(vec![job.error_message.clone()])),
    ],
  )?;
  Ok(batch)
}

fn batch_to_job(batch: &RecordBatch, row: usize) -> Result<Job> {
  let id = get_string(batch, row, "id")?.parse::<Uuid>().map_err(|e| DbError::NotFound(e.to_string()))?;
  let job_type = get_string(batch, row, "job_type")?.parse::<JobType>().map_err(DbError::NotFound)?;
  let status = get_string(batch, row, "status")?.parse::<JobStatus>().map_err(DbError::NotFound)?;
  let include_patterns: Vec<String> = serde_json::from_str(&get_string(batch, row, "include_patterns")?)?;
  let exclude_patterns: Vec<String> = serde_json::from_str(&get_string(batch, row, "exclude_patterns")?)?;
  let processing_order: Vec<String> = serde_json::from_str(&get_string(batch, row, "processing_order")?)?;

  let checkpoint: Option<Checkpoint> = batch
    .column_by_name("checkpoint")
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .and_then(|a| if a.is_null(row) { None } else { Some(a.value(row).to_string()) })
    .map(|s| serde_json::from_str(&s))
    .transpose()?;

  Ok(Job {
    id,
    repository_root: get_string(batch, row, "repository_root")?,
    job_type,
    status,
    include_patterns,
    exclude_patterns,
    force_reindex: get_bool(batch, row, "force_reindex")?,
    total_files: get_u64(batch, row, "total_files")?,
    processed_files: get_u64(batch, row, "processed_files")?,
    failed_files: get_u64(batch, row, "failed_files")?,
    skipped_files: get_u64(batch, row, "skipped_files")?,
    created_at: from_timestamp_millis(get_i64(batch, row, "created_at")?)?,
    started_at: get_optional_i64(batch, row, "started_at").map(from_timestamp_millis).transpose()?,
    completed_at: get_optional_i64(batch, row, "completed_at").map(from_timestamp_millis).transpose()?,
    processing_order,
    last_processed_file: crate::batch_helpers::get_optional_string(batch, row, "last_processed_file"),
    checkpoint,
    error_message: crate::batch_helpers::get_optional_string(batch, row, "error_message"),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use repodex_core::JobSpec;
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
      include_patterns: vec!["**/*.py".to_string()],
      exclude_patterns: vec!["**/tests/**".to_string()],
      force_reindex: false,
    })
  }

  #[tokio::test]
  async fn create_and_get_job_round_trips() {
    let (_temp, db) = create_test_db().await;
    let job = sample_job();
    db.create_job(&job).await.unwrap();

    let fetched = db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.repository_root, "/repo");
    assert_eq!(fetched.status, JobStatus::Pending);
    assert_eq!(fetched.include_patterns, vec!["**/*.py".to_string()]);
  }

  #[tokio::test]
  async fn transition_job_fails_on_status_mismatch() {
    let (_temp, db) = create_test_db().await;
    let job = sample_job();
    db.create_job(&job).await.unwrap();

    let transitioned = db.transition_job(job.id, JobStatus::Running, JobStatus::Paused, |_| {}).await.unwrap();
    assert!(!transitioned);
  }

  #[tokio::test]
  async fn transition_job_succeeds_on_matching_status() {
    let (_temp, db) = create_test_db().await;
    let job = sample_job();
    db.create_job(&job).await.unwrap();

    let transitioned = db
      .transition_job(job.id, JobStatus::Pending, JobStatus::Running, |j| {
        j.started_at = Some(chrono::Utc::now());
      })
      .await
      .unwrap();
    assert!(transitioned);

    let fetched = db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, JobStatus::Running);
    assert!(fetched.started_at.is_some());
  }

  #[tokio::test]
  async fn concurrent_transitions_from_the_same_status_only_let_one_through() {
    let (_temp, db) = create_test_db().await;
    let job = sample_job();
    db.create_job(&job).await.unwrap();
    let db = Arc::new(db);

    let mut handles = Vec::new();
    for _ in 0..8 {
      let db = db.clone();
      let id = job.id;
      handles.push(tokio::spawn(async move { db.transition_job(id, JobStatus::Pending, JobStatus::Running, |_| {}).await.unwrap() }));
    }

    let mut successes = 0;
    for handle in handles {
      if handle.await.unwrap() {
        successes += 1;
      }
    }
    assert_eq!(successes, 1);

    let fetched = db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, JobStatus::Running);
  }

  #[tokio::test]
  async fn list_recent_jobs_orders_newest_first() {
    let (_temp, db) = create_test_db().await;
    let first = sample_job();
    db.create_job(&first).await.unwrap();
    let mut second = sample_job();
    second.created_at = first.created_at + chrono::Duration::seconds(1);
    db.create_job(&second).await.unwrap();

    let jobs = db.list_recent_jobs(10).await.unwrap();
    assert_eq!(jobs[0].id, second.id);
  }

  #[tokio::test]
  async fn replace_job_preserves_checkpoint() {
    let (_temp, db) = create_test_db().await;
    let mut job = sample_job();
    job.processing_order = vec!["a.py".into(), "b.py".into()];
    job.checkpoint = Some(Checkpoint::new(1, 2, false));
    db.create_job(&job).await.unwrap();
    db.replace_job(&job).await.unwrap();

    let fetched = db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.checkpoint.unwrap().index_in_processing_order, 1);
  }
}

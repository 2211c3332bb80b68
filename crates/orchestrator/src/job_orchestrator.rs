//! Owns a job's lifecycle end to end: discovery, chunking, scheduling,
//! checkpointing, pause/resume, and finalization.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use indexer::{FileOutcome, Indexer};
use repodex_core::{
  Checkpoint, DeadLetterEntry, ErrorKind, ErrorKindTag, FileState, FileStatus, Job, JobSpec, JobStatus, Language,
  RepositorySnapshot, Stage,
};
use store::RepoDb;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunking::{self, ChunkingLimits};
use crate::coordination::{CoordinationError, RepositoryCoordinator};
use crate::discovery::{self, DiscoveredFile, DiscoveryError};

#[derive(Error, Debug)]
pub enum OrchestratorError {
  #[error("store error: {0}")]
  Store(#[from] store::DbError),
  #[error("discovery error: {0}")]
  Discovery(#[from] DiscoveryError),
  #[error("coordination error: {0}")]
  Coordination(#[from] CoordinationError),
  #[error("indexer error: {0}")]
  Indexer(#[from] indexer::IndexerError),
  #[error("job {0} not found")]
  JobNotFound(Uuid),
  #[error("job {0} is not in a runnable state (status: {1:?})")]
  InvalidTransition(Uuid, JobStatus),
  #[error("repository {0} is already being indexed by another orchestrator")]
  AlreadyRunning(String),
}

/// Drives jobs to completion. One instance is expected to be shared across
/// all jobs a process runs; [`RepositoryCoordinator`] is what actually
/// enforces one-orchestrator-per-repository-root.
pub struct JobOrchestrator {
  store: Arc<RepoDb>,
  indexer: Arc<Indexer>,
  coordinator: Arc<RepositoryCoordinator>,
  chunking_limits: ChunkingLimits,
  max_retries: u32,
}

impl JobOrchestrator {
  pub fn new(store: Arc<RepoDb>, indexer: Arc<Indexer>, coordinator: Arc<RepositoryCoordinator>) -> Self {
    Self { store, indexer, coordinator, chunking_limits: ChunkingLimits::default(), max_retries: 3 }
  }

  pub fn with_chunking_limits(mut self, limits: ChunkingLimits) -> Self {
    self.chunking_limits = limits;
    self
  }

  pub fn with_max_retries(mut self, max_retries: u32) -> Self {
    self.max_retries = max_retries;
    self
  }

  /// Persists a new job in PENDING status. Does not start processing —
  /// call [`Self::run_job`] (directly, or from a queue worker) to drive it.
  pub async fn submit(&self, spec: JobSpec) -> Result<Uuid, OrchestratorError> {
    let job = Job::new(spec);
    self.store.create_job(&job).await?;
    info!(job_id = %job.id, root = %job.repository_root, "job submitted");
    Ok(job.id)
  }

  /// CAS RUNNING → PAUSED. The running worker observes this at the next
  /// chunk boundary and exits cleanly after writing its checkpoint.
  pub async fn pause(&self, job_id: Uuid) -> Result<bool, OrchestratorError> {
    Ok(self.store.transition_job(job_id, JobStatus::Running, JobStatus::Paused, |_| {}).await?)
  }

  /// Continues a paused (or freshly submitted) job from where it left off.
  /// This is just [`Self::run_job`] under a name matching the job-control
  /// surface's vocabulary — resuming and running are the same operation.
  pub async fn resume(&self, job_id: Uuid) -> Result<(), OrchestratorError> {
    self.run_job(job_id).await
  }

  /// CAS to CANCELLED from whichever non-terminal status the job is
  /// currently in. Returns `false` if the job is already terminal.
  pub async fn cancel(&self, job_id: Uuid) -> Result<bool, OrchestratorError> {
    for from in [JobStatus::Running, JobStatus::Paused, JobStatus::Pending] {
      let cancelled = self
        .store
        .transition_job(job_id, from, JobStatus::Cancelled, |job| job.completed_at = Some(Utc::now()))
        .await?;
      if cancelled {
        return Ok(true);
      }
    }
    Ok(false)
  }

  /// Runs (or resumes) a job to a terminal status, or until it is paused or
  /// cancelled out from under it. Enforces single-instance coordination on
  /// the job's repository root for the duration of the run.
  pub async fn run_job(&self, job_id: Uuid) -> Result<(), OrchestratorError> {
    let mut job = self.fetch_job(job_id).await?;
    let from_status = job.status;
    if from_status != JobStatus::Pending && from_status != JobStatus::Paused {
      return Err(OrchestratorError::InvalidTransition(job_id, from_status));
    }

    let root = discovery::canonicalize_root(&job.repository_root);
    if !self.coordinator.try_acquire(&job_id.to_string(), &root)? {
      return Err(OrchestratorError::AlreadyRunning(job.repository_root.clone()));
    }

    let result = self.drive(&mut job, from_status).await;
    self.coordinator.release(&root)?;
    result
  }

  async fn drive(&self, job: &mut Job, from_status: JobStatus) -> Result<(), OrchestratorError> {
    let starting_fresh = from_status == JobStatus::Pending;
    let transitioned = self
      .store
      .transition_job(job.id, from_status, JobStatus::Running, |j| {
        if starting_fresh {
          j.started_at = Some(Utc::now());
        }
      })
      .await?;
    if !transitioned {
      return Err(OrchestratorError::InvalidTransition(job.id, from_status));
    }
    *job = self.fetch_job(job.id).await?;

    if job.processing_order.is_empty() {
      let discovered = discovery::discover(
        &self.store,
        job.id,
        job.job_type,
        &job.repository_root,
        &job.include_patterns,
        &job.exclude_patterns,
        job.force_reindex,
      )
      .await?;
      job.processing_order = discovery::processing_order(&discovered);
      job.total_files = job.processing_order.len() as u64;
      self.store.replace_job(job).await?;
    }

    let remaining: Vec<String> = job.remaining_files().to_vec();
    let chunks = chunking::chunk_files(&files_with_sizes(&remaining), self.chunking_limits);
    let mut index_in_order = job.resume_index().map(|i| i + 1).unwrap_or(0);

    for chunk in chunks {
      let current_status = self.fetch_job(job.id).await?.status;
      if current_status != JobStatus::Running {
        info!(job_id = %job.id, status = ?current_status, "worker observed non-running status at chunk boundary");
        return Ok(());
      }

      let mut chunk_failed = false;
      for path in &chunk.files {
        let outcome = self.index_file_with_retries(job, path).await?;
        match outcome.status {
          FileStatus::Completed => job.processed_files += 1,
          FileStatus::Skipped => job.skipped_files += 1,
          FileStatus::Failed => {
            job.failed_files += 1;
            chunk_failed = true;
            self.maybe_dead_letter(job.id, path).await?;
          }
          FileStatus::Pending | FileStatus::Processing => {}
        }
        job.last_processed_file = Some(path.clone());
        index_in_order += 1;
      }

      job.checkpoint = Some(Checkpoint::new(index_in_order.saturating_sub(1), chunk.len(), chunk_failed));
      self.store.replace_job(job).await?;

      if job.should_abort() {
        warn!(job_id = %job.id, "abort threshold reached, failing job");
        self.finalize(job, JobStatus::Failed, Some("failure_rate_exceeded".to_string())).await?;
        return Ok(());
      }
    }

    self.finalize(job, JobStatus::Completed, None).await?;
    Ok(())
  }

  /// After a completed or failed run: mark any file left non-terminal as
  /// skipped, write the repository snapshot, and transition to the
  /// terminal status.
  async fn finalize(
    &self,
    job: &mut Job,
    target_status: JobStatus,
    error_message: Option<String>,
  ) -> Result<(), OrchestratorError> {
    for path in job.processing_order.clone() {
      let existing = self.store.get_file_state(job.id, &path).await?;
      if existing.as_ref().is_some_and(|state| state.status.is_terminal()) {
        continue;
      }
      let mut state = existing.unwrap_or_else(|| FileState::pending(job.id, path.clone()));
      state.mark_skipped("terminated_before_processed");
      self.store.upsert_file_state(&state).await?;
      job.skipped_files += 1;
    }

    job.completed_at = Some(Utc::now());
    job.error_message = error_message;
    self.store.replace_job(job).await?;

    let transitioned = self.store.transition_job(job.id, JobStatus::Running, target_status, |_| {}).await?;
    if !transitioned {
      warn!(job_id = %job.id, "finalize CAS did not match RUNNING; job may have been cancelled concurrently");
    }
    *job = self.fetch_job(job.id).await?;

    let completed_states = self.store.list_files_by_status(job.id, FileStatus::Completed, usize::MAX).await?;
    let total_entities: u64 = completed_states.iter().map(|s| s.entities_extracted).sum();
    let total_duration: f64 = completed_states.iter().filter_map(|s| s.processing_duration_seconds).sum();
    let mut language_distribution = HashMap::new();
    for state in &completed_states {
      let extension = Path::new(&state.path).extension().and_then(|e| e.to_str()).unwrap_or("");
      let language = Language::from_extension(extension);
      *language_distribution.entry(language.as_str().to_string()).or_insert(0u64) += 1;
    }

    let snapshot = RepositorySnapshot::from_job(job, total_entities, total_duration, language_distribution);
    self.store.insert_snapshot(&snapshot).await?;
    Ok(())
  }

  /// Indexes `path`, and on failure resets it to PENDING and reprocesses it
  /// in place, up to `max_retries` additional attempts, before handing the
  /// last outcome back to the chunk loop. `FileState::retry_count` is what
  /// [`Self::maybe_dead_letter`] later checks against the same budget, so a
  /// file that exhausts its retries here is the one that gets dead-lettered.
  async fn index_file_with_retries(&self, job: &Job, path: &str) -> Result<FileOutcome, OrchestratorError> {
    let mut outcome = self.indexer.index_file(job, path).await?;

    while outcome.status == FileStatus::Failed {
      let Some(state) = self.store.get_file_state(job.id, path).await? else { break };
      if state.retry_count >= self.max_retries {
        break;
      }
      let Some(retried) = self.store.retry_file_state(job.id, path).await? else { break };
      if retried.status != FileStatus::Pending {
        break;
      }
      info!(job_id = %job.id, path, retry_count = state.retry_count, "retrying failed file");
      outcome = self.indexer.index_file(job, path).await?;
    }

    Ok(outcome)
  }

  async fn maybe_dead_letter(&self, job_id: Uuid, path: &str) -> Result<(), OrchestratorError> {
    let Some(state) = self.store.get_file_state(job_id, path).await? else { return Ok(()) };
    if state.retry_count < self.max_retries {
      return Ok(());
    }

    let kind = state.error_kind.map(tag_to_kind).unwrap_or(ErrorKind::Internal);
    let message = state.error_message.clone().unwrap_or_else(|| "exhausted retries".to_string());
    let entry = DeadLetterEntry::new(job_id, path, Stage::Index, kind, message, Vec::new());
    self.store.append_dead_letter(&entry).await?;
    Ok(())
  }

  async fn fetch_job(&self, job_id: Uuid) -> Result<Job, OrchestratorError> {
    self.store.get_job(job_id).await?.ok_or(OrchestratorError::JobNotFound(job_id))
  }
}

fn tag_to_kind(tag: ErrorKindTag) -> ErrorKind {
  match tag {
    ErrorKindTag::InvalidInput => ErrorKind::InvalidInput,
    ErrorKindTag::NotFound => ErrorKind::NotFound,
    ErrorKindTag::Conflict => ErrorKind::Conflict,
    ErrorKindTag::TransientThrottled => ErrorKind::TransientThrottled,
    ErrorKindTag::TransientTransport => ErrorKind::TransientTransport,
    ErrorKindTag::PermanentAuthorization => ErrorKind::PermanentAuthorization,
    ErrorKindTag::PermanentParse => ErrorKind::PermanentParse,
    ErrorKindTag::CircuitOpen => ErrorKind::CircuitOpen,
    ErrorKindTag::ResourceExhausted => ErrorKind::ResourceExhausted,
    ErrorKindTag::Internal => ErrorKind::Internal,
  }
}

/// Reads on-disk sizes for chunking. A file that vanished between discovery
/// and scheduling is still attempted — size 0 just means it never forces an
/// oversized chunk of its own; `Indexer::index_file` reports the read
/// failure normally.
fn files_with_sizes(paths: &[String]) -> Vec<DiscoveredFile> {
  paths
    .iter()
    .map(|path| {
      let size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
      DiscoveredFile { path: path.clone(), size_bytes }
    })
    .collect()
}

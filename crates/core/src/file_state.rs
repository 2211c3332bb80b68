use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
  Pending,
  Processing,
  Completed,
  Failed,
  Skipped,
}

impl FileStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      FileStatus::Pending => "pending",
      FileStatus::Processing => "processing",
      FileStatus::Completed => "completed",
      FileStatus::Failed => "failed",
      FileStatus::Skipped => "skipped",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, FileStatus::Completed | FileStatus::Failed | FileStatus::Skipped)
  }
}

impl std::str::FromStr for FileStatus {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "pending" => Ok(FileStatus::Pending),
      "processing" => Ok(FileStatus::Processing),
      "completed" => Ok(FileStatus::Completed),
      "failed" => Ok(FileStatus::Failed),
      "skipped" => Ok(FileStatus::Skipped),
      other => Err(format!("unknown file status: {other}")),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Ingest,
  Embed,
  Index,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Ingest => "ingest",
      Stage::Embed => "embed",
      Stage::Index => "index",
    }
  }
}

impl std::str::FromStr for Stage {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "ingest" => Ok(Stage::Ingest),
      "embed" => Ok(Stage::Embed),
      "index" => Ok(Stage::Index),
      other => Err(format!("unknown stage: {other}")),
    }
  }
}

/// Per-(job, file path) progress and outcome record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileState {
  pub job_id: uuid::Uuid,
  pub path: String,
  pub status: FileStatus,

  pub content_hash: Option<String>,
  pub size_bytes: u64,

  pub entities_extracted: u64,
  pub embeddings_generated: u64,
  pub processing_duration_seconds: Option<f64>,
  pub error_kind: Option<ErrorKindTag>,
  pub error_message: Option<String>,
  pub retry_count: u32,
  pub skip_reason: Option<String>,

  pub last_stage: Option<Stage>,
  pub last_offset: u64,

  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// Serializable mirror of [`ErrorKind`] for storage; `ErrorKind` itself
/// carries no serde impl since it is also used as a lightweight in-process
/// tag attached to live `Error` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKindTag {
  InvalidInput,
  NotFound,
  Conflict,
  TransientThrottled,
  TransientTransport,
  PermanentAuthorization,
  PermanentParse,
  CircuitOpen,
  ResourceExhausted,
  Internal,
}

impl ErrorKindTag {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorKindTag::InvalidInput => "invalid_input",
      ErrorKindTag::NotFound => "not_found",
      ErrorKindTag::Conflict => "conflict",
      ErrorKindTag::TransientThrottled => "transient_throttled",
      ErrorKindTag::TransientTransport => "transient_transport",
      ErrorKindTag::PermanentAuthorization => "permanent_authorization",
      ErrorKindTag::PermanentParse => "permanent_parse",
      ErrorKindTag::CircuitOpen => "circuit_open",
      ErrorKindTag::ResourceExhausted => "resource_exhausted",
      ErrorKindTag::Internal => "internal",
    }
  }
}

impl std::str::FromStr for ErrorKindTag {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s {
      "invalid_input" => Ok(ErrorKindTag::InvalidInput),
      "not_found" => Ok(ErrorKindTag::NotFound),
      "conflict" => Ok(ErrorKindTag::Conflict),
      "transient_throttled" => Ok(ErrorKindTag::TransientThrottled),
      "transient_transport" => Ok(ErrorKindTag::TransientTransport),
      "permanent_authorization" => Ok(ErrorKindTag::PermanentAuthorization),
      "permanent_parse" => Ok(ErrorKindTag::PermanentParse),
      "circuit_open" => Ok(ErrorKindTag::CircuitOpen),
      "resource_exhausted" => Ok(ErrorKindTag::ResourceExhausted),
      "internal" => Ok(ErrorKindTag::Internal),
      other => Err(format!("unknown error kind: {other}")),
    }
  }
}

impl From<ErrorKind> for ErrorKindTag {
  fn from(kind: ErrorKind) -> Self {
    match kind {
      ErrorKind::InvalidInput => ErrorKindTag::InvalidInput,
      ErrorKind::NotFound => ErrorKindTag::NotFound,
      ErrorKind::Conflict => ErrorKindTag::Conflict,
      ErrorKind::TransientThrottled => ErrorKindTag::TransientThrottled,
      ErrorKind::TransientTransport => ErrorKindTag::TransientTransport,
      ErrorKind::PermanentAuthorization => ErrorKindTag::PermanentAuthorization,
      ErrorKind::PermanentParse => ErrorKindTag::PermanentParse,
      ErrorKind::CircuitOpen => ErrorKindTag::CircuitOpen,
      ErrorKind::ResourceExhausted => ErrorKindTag::ResourceExhausted,
      ErrorKind::Internal => ErrorKindTag::Internal,
    }
  }
}

impl FileState {
  pub fn pending(job_id: uuid::Uuid, path: impl Into<String>) -> Self {
    Self {
      job_id,
      path: path.into(),
      status: FileStatus::Pending,
      content_hash: None,
      size_bytes: 0,
      entities_extracted: 0,
      embeddings_generated: 0,
      processing_duration_seconds: None,
      error_kind: None,
      error_message: None,
      retry_count: 0,
      skip_reason: None,
      last_stage: None,
      last_offset: 0,
      started_at: None,
      completed_at: None,
    }
  }

  pub fn mark_processing(&mut self) {
    self.status = FileStatus::Processing;
    self.started_at = Some(Utc::now());
    self.completed_at = None;
  }

  pub fn mark_completed(&mut self, entities_extracted: u64, embeddings_generated: u64) {
    self.status = FileStatus::Completed;
    self.entities_extracted = entities_extracted;
    self.embeddings_generated = embeddings_generated;
    self.completed_at = Some(Utc::now());
    if let Some(started) = self.started_at {
      self.processing_duration_seconds = Some((Utc::now() - started).num_milliseconds() as f64 / 1000.0);
    }
  }

  pub fn mark_failed(&mut self, kind: ErrorKind, message: impl Into<String>) {
    self.status = FileStatus::Failed;
    self.error_kind = Some(kind.into());
    self.error_message = Some(message.into());
    self.retry_count += 1;
    self.completed_at = Some(Utc::now());
  }

  pub fn mark_skipped(&mut self, reason: impl Into<String>) {
    self.status = FileStatus::Skipped;
    self.skip_reason = Some(reason.into());
    self.completed_at = Some(Utc::now());
  }

  /// Returns a FAILED state to PENDING for another attempt. `retry_count`
  /// is left as-is — it already counts the attempt that just failed — so
  /// the caller can compare it against a retry budget before calling this.
  pub fn reset_for_retry(&mut self) {
    self.status = FileStatus::Pending;
    self.completed_at = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn job_id() -> uuid::Uuid {
    uuid::Uuid::now_v7()
  }

  #[test]
  fn pending_state_has_no_terminal_fields() {
    let state = FileState::pending(job_id(), "src/main.rs");
    assert_eq!(state.status, FileStatus::Pending);
    assert!(state.completed_at.is_none());
  }

  #[test]
  fn mark_completed_sets_completed_at_after_started_at() {
    let mut state = FileState::pending(job_id(), "src/main.rs");
    state.mark_processing();
    let started = state.started_at.unwrap();
    state.mark_completed(3, 3);
    assert!(state.completed_at.unwrap() >= started);
    assert_eq!(state.entities_extracted, 3);
  }

  #[test]
  fn mark_failed_increments_retry_count() {
    let mut state = FileState::pending(job_id(), "src/a.py");
    state.mark_failed(ErrorKind::PermanentParse, "bad syntax");
    assert_eq!(state.retry_count, 1);
    assert_eq!(state.status, FileStatus::Failed);
    state.mark_failed(ErrorKind::PermanentParse, "bad syntax again");
    assert_eq!(state.retry_count, 2);
  }

  #[test]
  fn reset_for_retry_returns_to_pending_without_losing_retry_count() {
    let mut state = FileState::pending(job_id(), "src/a.py");
    state.mark_failed(ErrorKind::Internal, "transient");
    state.reset_for_retry();
    assert_eq!(state.status, FileStatus::Pending);
    assert_eq!(state.retry_count, 1);
    assert!(state.completed_at.is_none());
  }

  #[test]
  fn mark_skipped_records_reason() {
    let mut state = FileState::pending(job_id(), "vendor/bundle.min.js");
    state.mark_skipped("no parser registered");
    assert_eq!(state.skip_reason.as_deref(), Some("no parser registered"));
    assert!(state.status.is_terminal());
  }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::file_state::{ErrorKindTag, Stage};

/// One prior attempt recorded against a dead-lettered (job, path, stage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
  pub attempted_at: DateTime<Utc>,
  pub error_kind: ErrorKindTag,
  pub error_message: String,
}

/// Immutable failure record created once a (job, path, stage) has exhausted
/// its retries. Retained for human triage; never mutated except to flip
/// `resolved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
  pub id: Uuid,
  pub job_id: Uuid,
  pub path: String,
  pub stage: Stage,
  pub error_kind: ErrorKindTag,
  pub error_message: String,
  pub retry_history: Vec<RetryAttempt>,
  pub resolved: bool,
  pub created_at: DateTime<Utc>,
}

impl DeadLetterEntry {
  pub fn new(
    job_id: Uuid,
    path: impl Into<String>,
    stage: Stage,
    kind: ErrorKind,
    message: impl Into<String>,
    retry_history: Vec<RetryAttempt>,
  ) -> Self {
    Self {
      id: Uuid::now_v7(),
      job_id,
      path: path.into(),
      stage,
      error_kind: kind.into(),
      error_message: message.into(),
      retry_history,
      resolved: false,
      created_at: Utc::now(),
    }
  }

  pub fn mark_resolved(&mut self) {
    self.resolved = true;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_entry_is_unresolved() {
    let entry = DeadLetterEntry::new(
      Uuid::now_v7(),
      "src/broken.py",
      Stage::Embed,
      ErrorKind::TransientTransport,
      "timed out after 3 retries",
      vec![],
    );
    assert!(!entry.resolved);
  }

  #[test]
  fn mark_resolved_flips_flag() {
    let mut entry = DeadLetterEntry::new(
      Uuid::now_v7(),
      "src/broken.py",
      Stage::Embed,
      ErrorKind::TransientTransport,
      "timed out after 3 retries",
      vec![],
    );
    entry.mark_resolved();
    assert!(entry.resolved);
  }
}

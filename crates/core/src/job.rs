use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
  Full,
  Incremental,
  Selective,
}

impl JobType {
  pub fn as_str(&self) -> &'static str {
    match self {
      JobType::Full => "full",
      JobType::Incremental => "incremental",
      JobType::Selective => "selective",
    }
  }
}

impl std::str::FromStr for JobType {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "full" => Ok(JobType::Full),
      "incremental" => Ok(JobType::Incremental),
      "selective" => Ok(JobType::Selective),
      other => Err(format!("unknown job type: {other}")),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Pending,
  Running,
  Paused,
  Completed,
  Failed,
  Cancelled,
}

impl JobStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      JobStatus::Pending => "pending",
      JobStatus::Running => "running",
      JobStatus::Paused => "paused",
      JobStatus::Completed => "completed",
      JobStatus::Failed => "failed",
      JobStatus::Cancelled => "cancelled",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
  }
}

impl std::str::FromStr for JobStatus {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "pending" => Ok(JobStatus::Pending),
      "running" => Ok(JobStatus::Running),
      "paused" => Ok(JobStatus::Paused),
      "completed" => Ok(JobStatus::Completed),
      "failed" => Ok(JobStatus::Failed),
      "cancelled" => Ok(JobStatus::Cancelled),
      other => Err(format!("unknown job status: {other}")),
    }
  }
}

/// Durable checkpoint written after every chunk: the minimum state needed
/// to resume deterministically without rereading the whole job history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
  pub timestamp: DateTime<Utc>,
  pub index_in_processing_order: usize,
  pub chunk_size: usize,
  pub chunk_failed: bool,
  pub stage_counters: std::collections::HashMap<String, u64>,
}

impl Checkpoint {
  pub fn new(index_in_processing_order: usize, chunk_size: usize, chunk_failed: bool) -> Self {
    Self {
      timestamp: Utc::now(),
      index_in_processing_order,
      chunk_size,
      chunk_failed,
      stage_counters: std::collections::HashMap::new(),
    }
  }
}

/// Caller-supplied parameters for creating a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
  pub repository_root: String,
  pub job_type: JobType,
  #[serde(default)]
  pub include_patterns: Vec<String>,
  #[serde(default)]
  pub exclude_patterns: Vec<String>,
  #[serde(default)]
  pub force_reindex: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
  pub id: Uuid,
  pub repository_root: String,
  pub job_type: JobType,
  pub status: JobStatus,

  pub include_patterns: Vec<String>,
  pub exclude_patterns: Vec<String>,
  pub force_reindex: bool,

  pub total_files: u64,
  pub processed_files: u64,
  pub failed_files: u64,
  pub skipped_files: u64,

  pub created_at: DateTime<Utc>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,

  pub processing_order: Vec<String>,
  pub last_processed_file: Option<String>,
  pub checkpoint: Option<Checkpoint>,

  pub error_message: Option<String>,
}

impl Job {
  pub fn new(spec: JobSpec) -> Self {
    Self {
      id: Uuid::now_v7(),
      repository_root: spec.repository_root,
      job_type: spec.job_type,
      status: JobStatus::Pending,
      include_patterns: spec.include_patterns,
      exclude_patterns: spec.exclude_patterns,
      force_reindex: spec.force_reindex,
      total_files: 0,
      processed_files: 0,
      failed_files: 0,
      skipped_files: 0,
      created_at: Utc::now(),
      started_at: None,
      completed_at: None,
      processing_order: Vec::new(),
      last_processed_file: None,
      checkpoint: None,
      error_message: None,
    }
  }

  /// `processed / (processed + failed)`, only defined once at least 10
  /// files have been attempted; otherwise `None`.
  pub fn success_rate(&self) -> Option<f64> {
    let attempted = self.processed_files + self.failed_files;
    if attempted < 10 {
      return None;
    }
    Some(self.processed_files as f64 / attempted as f64)
  }

  pub fn progress_fraction(&self) -> f64 {
    if self.total_files == 0 {
      return 0.0;
    }
    let done = self.processed_files + self.failed_files + self.skipped_files;
    (done as f64 / self.total_files as f64).clamp(0.0, 1.0)
  }

  pub fn duration_seconds(&self) -> Option<i64> {
    match (self.started_at, self.completed_at) {
      (Some(start), Some(end)) => Some((end - start).num_seconds()),
      _ => None,
    }
  }

  /// Evaluates the abort condition from the orchestrator's failure-rate rule:
  /// `processed + failed >= 10 AND failed / (processed + failed) > 0.5`.
  pub fn should_abort(&self) -> bool {
    let attempted = self.processed_files + self.failed_files;
    attempted >= 10 && (self.failed_files as f64 / attempted as f64) > 0.5
  }

  /// Index of `last_processed_file` in `processing_order`, if present.
  pub fn resume_index(&self) -> Option<usize> {
    let last = self.last_processed_file.as_ref()?;
    self.processing_order.iter().position(|p| p == last)
  }

  /// The suffix of `processing_order` still to be attempted on resume.
  pub fn remaining_files(&self) -> &[String] {
    match self.resume_index() {
      Some(idx) => &self.processing_order[idx + 1..],
      None => &self.processing_order[..],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn spec() -> JobSpec {
    JobSpec {
      repository_root: "/repo".to_string(),
      job_type: JobType::Full,
      include_patterns: vec![],
      exclude_patterns: vec![],
      force_reindex: false,
    }
  }

  #[test]
  fn success_rate_undefined_below_ten_attempts() {
    let mut job = Job::new(spec());
    job.processed_files = 3;
    job.failed_files = 1;
    assert_eq!(job.success_rate(), None);
  }

  #[test]
  fn success_rate_defined_at_ten_attempts() {
    let mut job = Job::new(spec());
    job.processed_files = 8;
    job.failed_files = 2;
    assert_eq!(job.success_rate(), Some(0.8));
  }

  #[test]
  fn should_abort_matches_failure_rate_rule() {
    let mut job = Job::new(spec());
    job.processed_files = 4;
    job.failed_files = 6;
    assert!(job.should_abort());
  }

  #[test]
  fn should_abort_false_below_min_samples() {
    let mut job = Job::new(spec());
    job.processed_files = 1;
    job.failed_files = 3;
    assert!(!job.should_abort());
  }

  #[test]
  fn remaining_files_starts_from_beginning_when_no_last_processed() {
    let mut job = Job::new(spec());
    job.processing_order = vec!["a".into(), "b".into(), "c".into()];
    assert_eq!(job.remaining_files(), &["a".to_string(), "b".to_string(), "c".to_string()]);
  }

  #[test]
  fn remaining_files_resumes_after_last_processed() {
    let mut job = Job::new(spec());
    job.processing_order = vec!["a".into(), "b".into(), "c".into()];
    job.last_processed_file = Some("a".into());
    assert_eq!(job.remaining_files(), &["b".to_string(), "c".to_string()]);
  }

  #[test]
  fn remaining_files_restarts_when_last_processed_missing() {
    let mut job = Job::new(spec());
    job.processing_order = vec!["a".into(), "b".into()];
    job.last_processed_file = Some("gone".into());
    assert_eq!(job.remaining_files(), &["a".to_string(), "b".to_string()]);
  }

  #[test]
  fn progress_fraction_is_zero_for_empty_job() {
    let job = Job::new(spec());
    assert_eq!(job.progress_fraction(), 0.0);
  }
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::Job;

/// Aggregate record written once, on successful finalization of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySnapshot {
  pub id: Uuid,
  pub job_id: Uuid,
  pub repository_root: String,

  pub total_files: u64,
  pub processed_files: u64,
  pub failed_files: u64,
  pub skipped_files: u64,
  pub success_rate: Option<f64>,

  pub average_entities_per_file: f64,
  pub average_processing_duration_seconds: f64,
  pub language_distribution: HashMap<String, u64>,

  pub created_at: DateTime<Utc>,
}

impl RepositorySnapshot {
  /// Builds a snapshot from the job's terminal counters plus derived
  /// per-file aggregates collected by the caller during finalization.
  pub fn from_job(
    job: &Job,
    total_entities: u64,
    total_duration_seconds: f64,
    language_distribution: HashMap<String, u64>,
  ) -> Self {
    let attempted = job.processed_files;
    let average_entities_per_file =
      if attempted == 0 { 0.0 } else { total_entities as f64 / attempted as f64 };
    let average_processing_duration_seconds =
      if attempted == 0 { 0.0 } else { total_duration_seconds / attempted as f64 };

    Self {
      id: Uuid::now_v7(),
      job_id: job.id,
      repository_root: job.repository_root.clone(),
      total_files: job.total_files,
      processed_files: job.processed_files,
      failed_files: job.failed_files,
      skipped_files: job.skipped_files,
      success_rate: job.success_rate(),
      average_entities_per_file,
      average_processing_duration_seconds,
      language_distribution,
      created_at: Utc::now(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::job::{JobSpec, JobType};

  #[test]
  fn averages_are_zero_when_no_files_processed() {
    let job = Job::new(JobSpec {
      repository_root: "/repo".into(),
      job_type: JobType::Full,
      include_patterns: vec![],
      exclude_patterns: vec![],
      force_reindex: false,
    });
    let snapshot = RepositorySnapshot::from_job(&job, 0, 0.0, HashMap::new());
    assert_eq!(snapshot.average_entities_per_file, 0.0);
    assert_eq!(snapshot.average_processing_duration_seconds, 0.0);
  }

  #[test]
  fn averages_divide_by_processed_files() {
    let mut job = Job::new(JobSpec {
      repository_root: "/repo".into(),
      job_type: JobType::Full,
      include_patterns: vec![],
      exclude_patterns: vec![],
      force_reindex: false,
    });
    job.processed_files = 4;
    let snapshot = RepositorySnapshot::from_job(&job, 40, 8.0, HashMap::new());
    assert_eq!(snapshot.average_entities_per_file, 10.0);
    assert_eq!(snapshot.average_processing_duration_seconds, 2.0);
  }
}

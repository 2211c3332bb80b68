use repodex_core::FileStatus;

/// Result of running [`crate::index_file`] on a single file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
  pub status: FileStatus,
  pub entities_extracted: u64,
  pub embeddings_generated: u64,
  pub reason: Option<String>,
}

impl FileOutcome {
  pub fn completed(entities_extracted: u64, embeddings_generated: u64) -> Self {
    Self { status: FileStatus::Completed, entities_extracted, embeddings_generated, reason: None }
  }

  pub fn skipped(reason: impl Into<String>) -> Self {
    Self { status: FileStatus::Skipped, entities_extracted: 0, embeddings_generated: 0, reason: Some(reason.into()) }
  }

  pub fn failed(reason: impl Into<String>) -> Self {
    Self { status: FileStatus::Failed, entities_extracted: 0, embeddings_generated: 0, reason: Some(reason.into()) }
  }
}

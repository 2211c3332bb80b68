use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Per-entity document written to the search backend. Field set is fixed by
/// the contract the backend is expected to consume; the core does not
/// interpret these fields beyond building and upserting them.
#[derive(Debug, Clone, Serialize)]
pub struct SearchDocument {
  pub content: String,
  pub embedding: Vec<f32>,
  pub path: String,
  pub repo_id: String,
  pub commit: Option<String>,
  pub lang: String,
  pub kind: String,
  pub start_line: u32,
  pub end_line: u32,
  pub tool: String,
  pub content_hash: String,
  pub indexed_at: DateTime<Utc>,
}

impl SearchDocument {
  /// `SHA-256(content) || entity_id`, matching the upsert key the backend
  /// is expected to dedupe on.
  pub fn document_id(&self, entity_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.content.as_bytes());
    format!("{}{}", hex::encode(hasher.finalize()), entity_id)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
  #[error("search backend write failed: {0}")]
  WriteFailed(String),
}

/// Write-only interface to the search backend. The core never reads
/// through this trait — querying and ranking are out of scope (§1).
#[async_trait]
pub trait SearchSink: Send + Sync {
  async fn upsert(&self, document_id: &str, document: SearchDocument) -> Result<(), SinkError>;
}

/// In-memory sink for tests and for running the pipeline without a
/// production search engine wired in.
#[derive(Default)]
pub struct InMemorySink {
  documents: std::sync::Mutex<std::collections::HashMap<String, SearchDocument>>,
}

impl InMemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.documents.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn get(&self, document_id: &str) -> Option<SearchDocument> {
    self.documents.lock().unwrap().get(document_id).cloned()
  }
}

#[async_trait]
impl SearchSink for InMemorySink {
  async fn upsert(&self, document_id: &str, document: SearchDocument) -> Result<(), SinkError> {
    self.documents.lock().unwrap().insert(document_id.to_string(), document);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use repodex_core::Language;

  fn sample_document() -> SearchDocument {
    SearchDocument {
      content: "fn foo() {}".to_string(),
      embedding: vec![0.1, 0.2],
      path: "src/main.rs".to_string(),
      repo_id: "repo-a".to_string(),
      commit: None,
      lang: Language::Rust.as_str().to_string(),
      kind: "function".to_string(),
      start_line: 1,
      end_line: 1,
      tool: "reference-http".to_string(),
      content_hash: "abc".to_string(),
      indexed_at: Utc::now(),
    }
  }

  #[test]
  fn document_id_is_deterministic_for_identical_content() {
    let doc = sample_document();
    assert_eq!(doc.document_id("entity-1"), doc.document_id("entity-1"));
  }

  #[tokio::test]
  async fn in_memory_sink_upsert_overwrites_same_id() {
    let sink = InMemorySink::new();
    let doc = sample_document();
    let id = doc.document_id("entity-1");
    sink.upsert(&id, doc.clone()).await.unwrap();
    sink.upsert(&id, doc).await.unwrap();
    assert_eq!(sink.len(), 1);
  }
}

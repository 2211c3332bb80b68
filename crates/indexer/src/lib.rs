pub mod outcome;
pub mod sink;

pub use outcome::FileOutcome;
pub use sink::{InMemorySink, SearchDocument, SearchSink, SinkError};

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use embedding::EmbeddingPipeline;
use parser::ParserRegistry;
use repodex_core::{Entity, FileState, Job, content_hash};
use store::RepoDb;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
  #[error("store error: {0}")]
  Store(#[from] store::DbError),
  #[error("io error reading {path}: {source}")]
  Io { path: String, source: std::io::Error },
}

/// Drives one file end to end: parse, embed, index, update `FileState`.
/// Owns no per-job state beyond the collaborators it was built with — safe
/// to share across concurrently processed files within a chunk.
pub struct Indexer {
  store: Arc<RepoDb>,
  parsers: Arc<ParserRegistry>,
  pipeline: Arc<EmbeddingPipeline>,
  sink: Arc<dyn SearchSink>,
  tool_name: String,
}

impl Indexer {
  pub fn new(
    store: Arc<RepoDb>,
    parsers: Arc<ParserRegistry>,
    pipeline: Arc<EmbeddingPipeline>,
    sink: Arc<dyn SearchSink>,
  ) -> Self {
    let tool_name = "repodex".to_string();
    Self { store, parsers, pipeline, sink, tool_name }
  }

  /// Processes `file_path` within `job`, updating its `FileState` in the
  /// store and returning the outcome. Errors from parsing, embedding, or
  /// indexing are caught here and recorded on the file row rather than
  /// propagated — only store I/O failures surface as `Err`.
  pub async fn index_file(&self, job: &Job, file_path: &str) -> Result<FileOutcome, IndexerError> {
    // Read before mutating this job's own state below: a prior COMPLETED
    // run of this path lives under an earlier job_id for the same
    // repository, never under this (fresh) job's own id.
    let previous_completed =
      self.store.find_latest_completed_file_state(&job.repository_root, file_path).await?;

    let mut state = self
      .store
      .get_file_state(job.id, file_path)
      .await?
      .unwrap_or_else(|| FileState::pending(job.id, file_path));

    state.mark_processing();
    self.store.upsert_file_state(&state).await?;

    let path = Path::new(file_path);
    let Some(parser) = self.parsers.resolve(path) else {
      state.mark_skipped("no parser registered for this file type");
      self.store.upsert_file_state(&state).await?;
      return Ok(FileOutcome::skipped("no parser registered for this file type"));
    };

    let bytes = match std::fs::read(path) {
      Ok(bytes) => bytes,
      Err(source) => {
        let message = source.to_string();
        state.mark_failed(repodex_core::ErrorKind::Internal, message.clone());
        self.store.upsert_file_state(&state).await?;
        return Ok(FileOutcome::failed(message));
      }
    };

    let text = String::from_utf8_lossy(&bytes).into_owned();
    let hash = content_hash(&text);

    let unchanged = previous_completed.as_ref().is_some_and(|prior| prior.content_hash.as_deref() == Some(hash.as_str()));
    if !job.force_reindex && unchanged {
      state.mark_skipped("content unchanged since last completed run");
      self.store.upsert_file_state(&state).await?;
      return Ok(FileOutcome::skipped("content unchanged since last completed run"));
    }

    state.content_hash = Some(hash.clone());
    state.size_bytes = bytes.len() as u64;

    let entities = match parser.parse(path, &bytes) {
      Ok(entities) => entities,
      Err(err) => {
        let message = err.to_string();
        state.mark_failed(repodex_core::ErrorKind::PermanentParse, message.clone());
        self.store.upsert_file_state(&state).await?;
        return Ok(FileOutcome::failed(message));
      }
    };

    if entities.is_empty() {
      state.mark_skipped("no entities extracted");
      self.store.upsert_file_state(&state).await?;
      return Ok(FileOutcome::skipped("no entities extracted"));
    }

    let (embeddings_generated, documents_written) = self.embed_and_index(job, file_path, &hash, &entities).await;

    if documents_written == 0 {
      let message = "all entities failed to embed or index".to_string();
      state.mark_failed(repodex_core::ErrorKind::Internal, message.clone());
      self.store.upsert_file_state(&state).await?;
      return Ok(FileOutcome::failed(message));
    }

    state.mark_completed(entities.len() as u64, embeddings_generated);
    self.store.upsert_file_state(&state).await?;
    Ok(FileOutcome::completed(entities.len() as u64, embeddings_generated))
  }

  /// Embeds and indexes every entity independently; a failure on one entity
  /// never prevents the rest from being attempted. Returns the count of
  /// embeddings generated and documents successfully written.
  async fn embed_and_index(&self, job: &Job, file_path: &str, content_hash: &str, entities: &[Entity]) -> (u64, u64) {
    if entities.is_empty() {
      return (0, 0);
    }

    let texts: Vec<String> = entities.iter().map(|e| e.text.clone()).collect();
    let embeddings = match self.pipeline.embed_with_cache(&texts).await {
      Ok(embeddings) => embeddings,
      Err(err) => {
        warn!(file = file_path, error = %err, "embedding failed for all entities in file");
        return (0, 0);
      }
    };

    let mut embeddings_generated = 0u64;
    let mut documents_written = 0u64;

    for (entity, embedding) in entities.iter().zip(embeddings.into_iter()) {
      embeddings_generated += 1;

      let document = SearchDocument {
        content: entity.text.clone(),
        embedding,
        path: file_path.to_string(),
        repo_id: job.repository_root.clone(),
        commit: None,
        lang: entity.language.as_str().to_string(),
        kind: entity.kind.clone(),
        start_line: entity.start_line,
        end_line: entity.end_line,
        tool: self.tool_name.clone(),
        content_hash: content_hash.to_string(),
        indexed_at: Utc::now(),
      };

      let document_id = document.document_id(&entity.entity_id());
      match self.sink.upsert(&document_id, document).await {
        Ok(()) => documents_written += 1,
        Err(err) => warn!(file = file_path, entity = %entity.name, error = %err, "failed to index entity"),
      }
    }

    debug!(file = file_path, embeddings_generated, documents_written, "file indexing pass complete");
    (embeddings_generated, documents_written)
  }
}

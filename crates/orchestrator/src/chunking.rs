//! Partitions `processing_order` into chunks under dual file-count and
//! byte-size limits.

use crate::discovery::DiscoveredFile;

/// One chunk of files to process as a unit between checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
  pub files: Vec<String>,
}

impl Chunk {
  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

/// Chunking limits. Mirrors [`repodex_core::ChunkingConfig`]'s file and byte
/// caps; `max_concurrent_chunks` lives with the scheduler, not here.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingLimits {
  pub max_files_per_chunk: usize,
  pub max_bytes_per_chunk: u64,
}

impl Default for ChunkingLimits {
  fn default() -> Self {
    Self { max_files_per_chunk: 50, max_bytes_per_chunk: 10 * 1024 * 1024 }
  }
}

/// Splits `files` into chunks honoring both limits simultaneously. A file
/// larger than `max_bytes_per_chunk` on its own gets a dedicated
/// single-file chunk rather than ever being split.
pub fn chunk_files(files: &[DiscoveredFile], limits: ChunkingLimits) -> Vec<Chunk> {
  let mut chunks = Vec::new();
  let mut current = Chunk::default();
  let mut current_bytes: u64 = 0;

  for file in files {
    let oversized = file.size_bytes > limits.max_bytes_per_chunk;

    if oversized {
      if !current.is_empty() {
        chunks.push(std::mem::take(&mut current));
        current_bytes = 0;
      }
      chunks.push(Chunk { files: vec![file.path.clone()] });
      continue;
    }

    let would_exceed_files = current.len() + 1 > limits.max_files_per_chunk;
    let would_exceed_bytes = current_bytes + file.size_bytes > limits.max_bytes_per_chunk;

    if !current.is_empty() && (would_exceed_files || would_exceed_bytes) {
      chunks.push(std::mem::take(&mut current));
      current_bytes = 0;
    }

    current.files.push(file.path.clone());
    current_bytes += file.size_bytes;
  }

  if !current.is_empty() {
    chunks.push(current);
  }

  chunks
}

#[cfg(test)]
mod tests {
  use super::*;

  fn file(path: &str, size: u64) -> DiscoveredFile {
    DiscoveredFile { path: path.to_string(), size_bytes: size }
  }

  #[test]
  fn splits_on_file_count_limit() {
    let files: Vec<_> = (0..5).map(|i| file(&format!("f{i}.rs"), 10)).collect();
    let chunks = chunk_files(&files, ChunkingLimits { max_files_per_chunk: 2, max_bytes_per_chunk: 1_000_000 });
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].len(), 2);
    assert_eq!(chunks[2].len(), 1);
  }

  #[test]
  fn splits_on_byte_limit() {
    let files = vec![file("a.rs", 40), file("b.rs", 40), file("c.rs", 40)];
    let chunks = chunk_files(&files, ChunkingLimits { max_files_per_chunk: 100, max_bytes_per_chunk: 80 });
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].files, vec!["a.rs".to_string(), "b.rs".to_string()]);
    assert_eq!(chunks[1].files, vec!["c.rs".to_string()]);
  }

  #[test]
  fn oversized_file_gets_its_own_chunk() {
    let files = vec![file("small.rs", 10), file("huge.rs", 1000), file("small2.rs", 10)];
    let chunks = chunk_files(&files, ChunkingLimits { max_files_per_chunk: 100, max_bytes_per_chunk: 100 });
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[1].files, vec!["huge.rs".to_string()]);
  }

  #[test]
  fn empty_input_produces_no_chunks() {
    let chunks = chunk_files(&[], ChunkingLimits::default());
    assert!(chunks.is_empty());
  }

  #[test]
  fn single_chunk_when_well_under_both_limits() {
    let files = vec![file("a.rs", 10), file("b.rs", 10)];
    let chunks = chunk_files(&files, ChunkingLimits::default());
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].len(), 2);
  }
}

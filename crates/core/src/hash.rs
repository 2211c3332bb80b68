use sha2::{Digest, Sha256};

/// Chunking strategy tag folded into the cache key. Bumped whenever the
/// embedding pipeline changes how content is split before embedding, so
/// stale cache entries from a prior chunking scheme are never served.
pub const CHUNKING_VERSION: &str = "v1_chunking";

/// Normalizes file content before hashing: CRLF is collapsed to LF and
/// trailing whitespace is trimmed from the whole buffer, so two files that
/// differ only in line endings or trailing blank space hash identically.
pub fn normalize_content(content: &str) -> String {
  content.replace("\r\n", "\n").trim_end().to_string()
}

/// Content hash used for change detection (`FileState::content_hash`).
pub fn content_hash(content: &str) -> String {
  let normalized = normalize_content(content);
  let mut hasher = Sha256::new();
  hasher.update(normalized.as_bytes());
  hex::encode(hasher.finalize())
}

/// Cache key for an embedding cache entry: `SHA256(normalize(content) || model_id || "|v1_chunking")`.
pub fn cache_key(content: &str, model_id: &str) -> String {
  let normalized = normalize_content(content);
  let mut hasher = Sha256::new();
  hasher.update(normalized.as_bytes());
  hasher.update(model_id.as_bytes());
  hasher.update(b"|");
  hasher.update(CHUNKING_VERSION.as_bytes());
  hex::encode(hasher.finalize())
}

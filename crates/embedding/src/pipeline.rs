use std::collections::HashMap;
use std::sync::Arc;

use repodex_core::cache_key;
use tracing::{debug, warn};

use crate::batch::{BatchConcurrency, BatchSizer};
use crate::circuit_breaker::{Admission, CircuitBreaker};
use crate::provider::{EmbeddingError, EmbeddingProvider};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

use cache::EmbeddingCache;

/// Content longer than this is truncated before hashing or embedding, so a
/// single oversized file can't dominate a batch or blow past a provider's
/// context window.
const DEFAULT_MAX_CONTENT_LENGTH: usize = 8000;

/// Ties the cache, provider, retry policy, circuit breaker, rate limiter and
/// batch sizing together behind a single `embed_with_cache` call. Inputs
/// already present in the cache never reach the provider.
pub struct EmbeddingPipeline {
  provider: Arc<dyn EmbeddingProvider>,
  cache: Arc<EmbeddingCache>,
  circuit_breaker: CircuitBreaker,
  rate_limiter: RateLimiter,
  retry_policy: RetryPolicy,
  batch_sizer: BatchSizer,
  concurrency: BatchConcurrency,
  max_content_length: usize,
}

impl EmbeddingPipeline {
  pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<EmbeddingCache>) -> Self {
    let endpoint = provider.name().to_string();
    Self {
      circuit_breaker: CircuitBreaker::new(endpoint.clone(), 5, std::time::Duration::from_secs(30)),
      rate_limiter: RateLimiter::new(endpoint, 100),
      retry_policy: RetryPolicy::default(),
      batch_sizer: BatchSizer::default(),
      concurrency: BatchConcurrency::default(),
      max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
      provider,
      cache,
    }
  }

  pub fn with_max_content_length(mut self, max_content_length: usize) -> Self {
    self.max_content_length = max_content_length;
    self
  }

  pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
    self.rate_limiter = rate_limiter;
    self
  }

  pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
    self.retry_policy = retry_policy;
    self
  }

  pub fn with_batch_sizer(mut self, batch_sizer: BatchSizer) -> Self {
    self.batch_sizer = batch_sizer;
    self
  }

  /// Rebuilds the circuit breaker against the same provider endpoint with
  /// the given thresholds, replacing the construction-time default.
  pub fn with_circuit_breaker(mut self, failure_threshold: u32, recovery_timeout: std::time::Duration) -> Self {
    let endpoint = self.provider.name().to_string();
    self.circuit_breaker = CircuitBreaker::new(endpoint, failure_threshold, recovery_timeout);
    self
  }

  /// Truncates to `max_content_length` Unicode code points (not bytes), so
  /// multi-byte content is not truncated more aggressively than ASCII.
  fn truncate<'a>(&self, content: &'a str) -> &'a str {
    match content.char_indices().nth(self.max_content_length) {
      Some((byte_offset, _)) => &content[..byte_offset],
      None => content,
    }
  }

  /// Embeds `contents`, serving cache hits without touching the provider and
  /// preserving input order in the returned vector.
  pub async fn embed_with_cache(&self, contents: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let model_id = self.provider.model_id().to_string();
    let truncated: Vec<&str> = contents.iter().map(|c| self.truncate(c)).collect();
    let keys: Vec<String> = truncated.iter().map(|c| cache_key(c, &model_id)).collect();

    let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(contents.len());
    let mut uncached_indices = Vec::new();

    for key in &keys {
      results.push(self.cache.get(key).await);
    }
    for (idx, result) in results.iter().enumerate() {
      if result.is_none() {
        uncached_indices.push(idx);
      }
    }

    if uncached_indices.is_empty() {
      debug!(count = contents.len(), "all inputs served from cache");
      return Ok(results.into_iter().map(|r| r.expect("checked above")).collect());
    }

    let uncached_texts: Vec<String> = uncached_indices.iter().map(|&idx| truncated[idx].to_string()).collect();
    let computed = self.embed_uncached(&uncached_texts).await?;

    let mut by_index: HashMap<usize, Vec<f32>> = HashMap::new();
    for (position, &idx) in uncached_indices.iter().enumerate() {
      let embedding = computed[position].clone();
      let key = keys[idx].clone();
      let cached = self.cache.get_or_create(&key, &model_id, || embedding.clone()).await;
      by_index.insert(idx, cached);
    }

    Ok(
      results
        .into_iter()
        .enumerate()
        .map(|(idx, existing)| existing.or_else(|| by_index.get(&idx).cloned()).expect("every index resolved"))
        .collect(),
    )
  }

  async fn embed_uncached(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in self.batch_sizer.chunk(texts) {
      let _permit = self.concurrency.acquire().await;

      for _ in 0..chunk.len() {
        self.rate_limiter.acquire().await;
      }

      if self.circuit_breaker.admit() == Admission::Rejected {
        warn!(endpoint = self.provider.name(), "circuit open, rejecting batch");
        return Err(EmbeddingError::CircuitOpen);
      }

      let result = self.retry_policy.run(|| self.provider.embed_batch(&chunk)).await;

      match &result {
        Ok(_) => self.circuit_breaker.record_success(),
        Err(err) if err.counts_toward_breaker() => self.circuit_breaker.record_failure(),
        Err(_) => {}
      }

      all_embeddings.extend(result?);
    }

    Ok(all_embeddings)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mock::MockProvider;
  use repodex_core::ProjectId;
  use std::path::Path;
  use tempfile::TempDir;

  async fn create_test_pipeline() -> (TempDir, EmbeddingPipeline) {
    let temp_dir = TempDir::new().unwrap();
    let project_id = ProjectId::from_path(Path::new("/test"));
    let db = store::RepoDb::open_at_path(project_id, temp_dir.path().join("test.lancedb"), 4).await.unwrap();
    let cache = Arc::new(EmbeddingCache::new(Arc::new(db), 100, 168));
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(MockProvider::new(4));
    (temp_dir, EmbeddingPipeline::new(provider, cache))
  }

  #[tokio::test]
  async fn embeds_uncached_inputs_and_preserves_order() {
    let (_temp, pipeline) = create_test_pipeline().await;
    let texts = vec!["alpha".to_string(), "beta".to_string()];
    let result = pipeline.embed_with_cache(&texts).await.unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].len(), 4);
  }

  #[tokio::test]
  async fn repeated_call_promotes_entry_into_hot_cache_tier() {
    let (_temp, pipeline) = create_test_pipeline().await;
    let texts = vec!["alpha".to_string()];
    pipeline.embed_with_cache(&texts).await.unwrap();
    assert_eq!(pipeline.cache.hot_tier_len(), 1);

    let second = pipeline.embed_with_cache(&texts).await.unwrap();
    assert_eq!(second[0].len(), 4);
    assert_eq!(pipeline.cache.hot_tier_len(), 1);
  }

  #[tokio::test]
  async fn truncates_oversized_content_before_hashing() {
    let (_temp, pipeline) = create_test_pipeline().await;
    let long = "x".repeat(20_000);
    let truncated = pipeline.truncate(&long);
    assert_eq!(truncated.chars().count(), DEFAULT_MAX_CONTENT_LENGTH);
  }

  #[tokio::test]
  async fn truncates_by_code_points_not_bytes_for_multibyte_content() {
    let (_temp, pipeline) = create_test_pipeline().await;
    let long = "é".repeat(20_000);
    let truncated = pipeline.truncate(&long);
    assert_eq!(truncated.chars().count(), DEFAULT_MAX_CONTENT_LENGTH);
    assert_eq!(truncated.len(), DEFAULT_MAX_CONTENT_LENGTH * 'é'.len_utf8());
  }
}

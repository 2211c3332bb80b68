use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::{EmbeddingError, EmbeddingProvider};

/// In-memory provider for tests. Returns deterministic vectors derived from
/// each input's length and byte sum, so equal inputs always embed equally
/// without hashing through a real model. Never wired into the CLI's default
/// provider selection.
pub struct MockProvider {
  dimensions: usize,
  call_count: AtomicUsize,
  fail_next: Mutex<Option<EmbeddingError>>,
  fail_always: Mutex<Option<Box<dyn Fn() -> EmbeddingError + Send + Sync>>>,
}

impl MockProvider {
  pub fn new(dimensions: usize) -> Self {
    Self { dimensions, call_count: AtomicUsize::new(0), fail_next: Mutex::new(None), fail_always: Mutex::new(None) }
  }

  pub fn calls(&self) -> usize {
    self.call_count.load(Ordering::SeqCst)
  }

  /// Queues a single failure to be returned on the next `embed_batch` call.
  pub fn fail_next_call(&self, error: EmbeddingError) {
    *self.fail_next.lock().unwrap() = Some(error);
  }

  /// Makes every subsequent `embed_batch` call fail until cleared. Unlike
  /// [`Self::fail_next_call`], this survives across however many retries an
  /// orchestrator drives.
  pub fn fail_every_call(&self, make_error: impl Fn() -> EmbeddingError + Send + Sync + 'static) {
    *self.fail_always.lock().unwrap() = Some(Box::new(make_error));
  }

  fn deterministic_vector(&self, text: &str) -> Vec<f32> {
    let sum: u32 = text.bytes().map(|b| b as u32).sum();
    let seed = (text.len() as f32 + sum as f32) / 1000.0;
    vec![seed; self.dimensions]
  }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
  fn name(&self) -> &str {
    "mock"
  }

  fn model_id(&self) -> &str {
    "mock-v1"
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    self.call_count.fetch_add(1, Ordering::SeqCst);

    if let Some(error) = self.fail_next.lock().unwrap().take() {
      return Err(error);
    }
    if let Some(make_error) = self.fail_always.lock().unwrap().as_ref() {
      return Err(make_error());
    }

    Ok(texts.iter().map(|t| self.deterministic_vector(t)).collect())
  }

  async fn is_available(&self) -> bool {
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn embeds_deterministically() {
    let provider = MockProvider::new(4);
    let texts = vec!["hello".to_string(), "hello".to_string()];
    let result = provider.embed_batch(&texts).await.unwrap();
    assert_eq!(result[0], result[1]);
    assert_eq!(result[0].len(), 4);
  }

  #[tokio::test]
  async fn fail_next_call_surfaces_once() {
    let provider = MockProvider::new(4);
    provider.fail_next_call(EmbeddingError::Throttled);
    let texts = vec!["hello".to_string()];
    assert!(provider.embed_batch(&texts).await.is_err());
    assert!(provider.embed_batch(&texts).await.is_ok());
  }

  #[tokio::test]
  async fn call_count_increments_per_batch() {
    let provider = MockProvider::new(4);
    let texts = vec!["a".to_string()];
    provider.embed_batch(&texts).await.unwrap();
    provider.embed_batch(&texts).await.unwrap();
    assert_eq!(provider.calls(), 2);
  }
}

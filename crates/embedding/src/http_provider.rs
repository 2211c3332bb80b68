use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::provider::{EmbeddingError, EmbeddingProvider};

const DEFAULT_URL: &str = "http://localhost:8088";
const DEFAULT_MODEL: &str = "reference-embedding";
const DEFAULT_DIMENSIONS: usize = 768;
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Reference provider against a local HTTP embedding service. The service
/// is expected to accept `{input_text, dimensions, normalize}` and respond
/// with `{embedding: [f32; dimensions]}` per request; there is no native
/// batch endpoint, so batches fan out with bounded concurrency.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
  client: reqwest::Client,
  base_url: String,
  model: String,
  dimensions: usize,
  concurrency: Arc<Semaphore>,
}

impl Default for HttpEmbeddingProvider {
  fn default() -> Self {
    Self::new()
  }
}

impl HttpEmbeddingProvider {
  pub fn new() -> Self {
    Self {
      client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
      base_url: DEFAULT_URL.to_string(),
      model: DEFAULT_MODEL.to_string(),
      dimensions: DEFAULT_DIMENSIONS,
      concurrency: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
    }
  }

  /// Overrides the per-request timeout (default 30s), rebuilding the
  /// underlying HTTP client.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.client = build_client(timeout);
    self
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.base_url = url.into();
    self
  }

  pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
    self.model = model.into();
    self.dimensions = dimensions;
    self
  }

  pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
    self.concurrency = Arc::new(Semaphore::new(max_concurrent.max(1)));
    self
  }

  fn embed_url(&self) -> String {
    format!("{}/embed", self.base_url)
  }

  fn health_url(&self) -> String {
    format!("{}/health", self.base_url)
  }

  async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let request = EmbedRequest { input_text: text, dimensions: self.dimensions, normalize: true };

    debug!(chars = text.len(), "embedding text via reference http provider");

    let response = self
      .client
      .post(self.embed_url())
      .json(&request)
      .send()
      .await
      .map_err(classify_transport_error)?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
      return Err(EmbeddingError::Throttled);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
      return Err(EmbeddingError::Unauthorized);
    }
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(%status, body = %body, "reference embedding provider returned an error");
      return Err(EmbeddingError::ProviderError(format!("{status}: {body}")));
    }

    let parsed: EmbedResponse = response.json().await.map_err(classify_transport_error)?;

    if parsed.embedding.len() != self.dimensions {
      warn!(got = parsed.embedding.len(), expected = self.dimensions, "embedding dimension mismatch");
    }

    Ok(parsed.embedding)
  }
}

fn build_client(timeout: Duration) -> reqwest::Client {
  reqwest::Client::builder().timeout(timeout).build().expect("failed to build reference http client")
}

fn classify_transport_error(err: reqwest::Error) -> EmbeddingError {
  if err.is_timeout() {
    EmbeddingError::Timeout
  } else {
    EmbeddingError::Transport(err)
  }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
  input_text: &'a str,
  dimensions: usize,
  normalize: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
  embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
  fn name(&self) -> &str {
    "reference-http"
  }

  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let futures = texts.iter().map(|text| {
      let provider = self.clone();
      let text = text.clone();
      let semaphore = provider.concurrency.clone();
      async move {
        let _permit = semaphore.acquire_owned().await.map_err(|_| EmbeddingError::ProviderError("semaphore closed".to_string()))?;
        provider.embed_one(&text).await
      }
    });

    futures::future::join_all(futures).await.into_iter().collect()
  }

  async fn is_available(&self) -> bool {
    match self.client.get(self.health_url()).send().await {
      Ok(response) => response.status().is_success(),
      Err(_) => false,
    }
  }
}

use async_trait::async_trait;
use repodex_core::ErrorKind;

/// Error surface for every embedding provider, mapped onto the crate-wide
/// error taxonomy via [`EmbeddingError::kind`] so callers can match on kind
/// rather than parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
  #[error("provider rate-limited the request")]
  Throttled,
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("provider rejected credentials")]
  Unauthorized,
  #[error("circuit open for this endpoint")]
  CircuitOpen,
  #[error("request timed out")]
  Timeout,
  #[error("provider returned an unexpected response: {0}")]
  ProviderError(String),
}

impl EmbeddingError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      EmbeddingError::Throttled => ErrorKind::TransientThrottled,
      EmbeddingError::Transport(_) | EmbeddingError::Timeout => ErrorKind::TransientTransport,
      EmbeddingError::Unauthorized => ErrorKind::PermanentAuthorization,
      EmbeddingError::CircuitOpen => ErrorKind::CircuitOpen,
      EmbeddingError::ProviderError(_) => ErrorKind::Internal,
    }
  }

  /// Whether a retry is worth attempting. Authorization failures and an
  /// already-open circuit are not retryable; everything transient is.
  pub fn is_retryable(&self) -> bool {
    matches!(self, EmbeddingError::Throttled | EmbeddingError::Transport(_) | EmbeddingError::Timeout)
  }

  /// Whether this failure should count toward the circuit breaker. Throttling
  /// is excluded per the rate-limiter/breaker separation of concerns.
  pub fn counts_toward_breaker(&self) -> bool {
    matches!(self, EmbeddingError::Transport(_) | EmbeddingError::Timeout | EmbeddingError::ProviderError(_))
  }
}

/// Batch-primary embedding client: every call embeds a sequence of texts and
/// returns vectors in the same order, same length.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
  fn name(&self) -> &str;
  fn model_id(&self) -> &str;
  fn dimensions(&self) -> usize;

  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

  async fn is_available(&self) -> bool;
}

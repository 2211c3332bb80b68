use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::provider::EmbeddingError;

/// Exponential backoff with jitter for per-call retries against the
/// embedding provider. `base` defaults to 0.5s, diverging from a generic
/// HTTP client's 1s default because embedding calls are expected to be
/// cheap and frequent; `max_retries` bounds total attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub base: Duration,
  pub max_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_retries: 3, base: Duration::from_millis(500), max_backoff: Duration::from_secs(30) }
  }
}

impl RetryPolicy {
  /// `wait = base * 2^attempt`, jittered by up to 25%, capped at `max_backoff`.
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let exp = self.base.as_secs_f64() * 2f64.powi(attempt as i32);
    let capped = exp.min(self.max_backoff.as_secs_f64());
    let jitter = 1.0 + rand::thread_rng().gen_range(0.0..0.25);
    Duration::from_secs_f64((capped * jitter).min(self.max_backoff.as_secs_f64()))
  }

  /// Runs `attempt` until it succeeds, exhausts retries, or fails with a
  /// non-retryable error. Authorization failures short-circuit immediately.
  pub async fn run<F, Fut, T>(&self, mut attempt: F) -> Result<T, EmbeddingError>
  where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, EmbeddingError>>,
  {
    let mut last_error = None;

    for attempt_no in 0..=self.max_retries {
      if attempt_no > 0 {
        let backoff = self.backoff_for_attempt(attempt_no - 1);
        debug!(attempt = attempt_no, backoff_ms = backoff.as_millis(), "retrying embedding call");
        sleep(backoff).await;
      }

      match attempt().await {
        Ok(value) => return Ok(value),
        Err(err) => {
          if !err.is_retryable() || attempt_no == self.max_retries {
            return Err(err);
          }
          warn!(attempt = attempt_no + 1, error = %err, "retryable embedding call failure");
          last_error = Some(err);
        }
      }
    }

    Err(last_error.unwrap_or(EmbeddingError::ProviderError("max retries exceeded".to_string())))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  #[test]
  fn default_base_is_half_a_second() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.base, Duration::from_millis(500));
    assert_eq!(policy.max_retries, 3);
  }

  #[test]
  fn backoff_grows_exponentially_before_jitter_floor() {
    let policy = RetryPolicy { base: Duration::from_millis(500), max_backoff: Duration::from_secs(60), max_retries: 3 };
    assert!(policy.backoff_for_attempt(0) >= Duration::from_millis(500));
    assert!(policy.backoff_for_attempt(1) >= Duration::from_secs(1));
    assert!(policy.backoff_for_attempt(2) >= Duration::from_secs(2));
  }

  #[test]
  fn backoff_respects_max() {
    let policy = RetryPolicy { base: Duration::from_secs(10), max_backoff: Duration::from_secs(30), max_retries: 3 };
    assert!(policy.backoff_for_attempt(5) <= Duration::from_secs(30) + Duration::from_millis(1));
  }

  #[tokio::test]
  async fn retries_until_success() {
    let policy = RetryPolicy { base: Duration::from_millis(1), max_backoff: Duration::from_millis(5), max_retries: 3 };
    let calls = AtomicU32::new(0);
    let result = policy
      .run(|| async {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < 2 { Err(EmbeddingError::Timeout) } else { Ok(42) }
      })
      .await;
    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn does_not_retry_unauthorized() {
    let policy = RetryPolicy { base: Duration::from_millis(1), max_backoff: Duration::from_millis(5), max_retries: 3 };
    let calls = AtomicU32::new(0);
    let result = policy
      .run(|| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(EmbeddingError::Unauthorized)
      })
      .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn exhausts_retries_and_returns_last_error() {
    let policy = RetryPolicy { base: Duration::from_millis(1), max_backoff: Duration::from_millis(5), max_retries: 2 };
    let calls = AtomicU32::new(0);
    let result = policy
      .run(|| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(EmbeddingError::Timeout)
      })
      .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }
}

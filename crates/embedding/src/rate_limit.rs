use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::debug;

/// Sliding-window rate limiter: at most `requests_per_minute` calls are
/// admitted within any trailing 60-second window. Callers that would exceed
/// the window are delayed until the oldest timestamp ages out, rather than
/// rejected.
pub struct RateLimiter {
  endpoint: String,
  max_requests: u32,
  window: Duration,
  timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
  pub fn new(endpoint: impl Into<String>, requests_per_minute: u32) -> Self {
    Self {
      endpoint: endpoint.into(),
      max_requests: requests_per_minute,
      window: Duration::from_secs(60),
      timestamps: Mutex::new(VecDeque::new()),
    }
  }

  /// Blocks until a slot is free, then records the new call's timestamp.
  pub async fn acquire(&self) {
    loop {
      let wait = {
        let mut timestamps = self.timestamps.lock().unwrap();
        let now = Instant::now();
        while let Some(&front) = timestamps.front() {
          if now.duration_since(front) >= self.window {
            timestamps.pop_front();
          } else {
            break;
          }
        }

        if (timestamps.len() as u32) < self.max_requests {
          timestamps.push_back(now);
          None
        } else {
          let oldest = *timestamps.front().unwrap();
          Some(self.window - now.duration_since(oldest))
        }
      };

      match wait {
        None => return,
        Some(duration) => {
          debug!(endpoint = %self.endpoint, wait_ms = duration.as_millis(), "rate limit window full, delaying");
          sleep(duration).await;
        }
      }
    }
  }

  pub fn current_load(&self) -> u32 {
    self.timestamps.lock().unwrap().len() as u32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn admits_calls_under_the_limit_without_delay() {
    let limiter = RateLimiter::new("endpoint-a", 5);
    for _ in 0..5 {
      limiter.acquire().await;
    }
    assert_eq!(limiter.current_load(), 5);
  }

  #[tokio::test]
  async fn delays_the_call_that_would_exceed_the_window() {
    let limiter = RateLimiter::new("endpoint-a", 2);
    limiter.acquire().await;
    limiter.acquire().await;

    let start = Instant::now();
    // Patch in a short window by directly constructing the struct for the test.
    let fast_limiter = RateLimiter { window: Duration::from_millis(50), ..limiter };
    fast_limiter.acquire().await;
    assert!(start.elapsed() >= Duration::from_millis(40));
  }
}

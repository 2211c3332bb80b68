use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  Closed,
  Open,
  HalfOpen,
}

struct Inner {
  state: State,
  consecutive_failures: u32,
  opened_at: Option<Instant>,
}

/// Per-endpoint circuit breaker. CLOSED admits calls normally; after
/// `failure_threshold` consecutive non-throttling failures it trips to OPEN
/// and fails fast until `recovery_timeout` elapses, then admits exactly one
/// HALF_OPEN probe.
pub struct CircuitBreaker {
  endpoint: String,
  failure_threshold: u32,
  recovery_timeout: Duration,
  inner: Mutex<Inner>,
}

/// Whether a call may proceed, and what to do with its outcome.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
  Allowed,
  Rejected,
}

impl CircuitBreaker {
  pub fn new(endpoint: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
    Self {
      endpoint: endpoint.into(),
      failure_threshold,
      recovery_timeout,
      inner: Mutex::new(Inner { state: State::Closed, consecutive_failures: 0, opened_at: None }),
    }
  }

  /// Call before attempting a provider request. Transitions OPEN → HALF_OPEN
  /// once the recovery timeout has elapsed.
  pub fn admit(&self) -> Admission {
    let mut inner = self.inner.lock().unwrap();
    match inner.state {
      State::Closed => Admission::Allowed,
      State::HalfOpen => Admission::Rejected,
      State::Open => {
        let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
        if elapsed >= self.recovery_timeout {
          info!(endpoint = %self.endpoint, "circuit breaker half-open, admitting probe");
          inner.state = State::HalfOpen;
          Admission::Allowed
        } else {
          Admission::Rejected
        }
      }
    }
  }

  /// Records a successful call. Closes the circuit and clears the failure
  /// counter, whether the call was a HALF_OPEN probe or a normal CLOSED call.
  pub fn record_success(&self) {
    let mut inner = self.inner.lock().unwrap();
    if inner.state != State::Closed {
      info!(endpoint = %self.endpoint, "circuit breaker closing after successful call");
    }
    inner.state = State::Closed;
    inner.consecutive_failures = 0;
    inner.opened_at = None;
  }

  /// Records a non-throttling failure. Trips the breaker to OPEN once
  /// `failure_threshold` consecutive failures accumulate, or immediately if
  /// the failing call was the HALF_OPEN probe.
  pub fn record_failure(&self) {
    let mut inner = self.inner.lock().unwrap();
    if inner.state == State::HalfOpen {
      warn!(endpoint = %self.endpoint, "half-open probe failed, reopening circuit");
      inner.state = State::Open;
      inner.opened_at = Some(Instant::now());
      return;
    }

    inner.consecutive_failures += 1;
    if inner.consecutive_failures >= self.failure_threshold {
      warn!(endpoint = %self.endpoint, failures = inner.consecutive_failures, "circuit breaker tripped open");
      inner.state = State::Open;
      inner.opened_at = Some(Instant::now());
    }
  }

  pub fn is_open(&self) -> bool {
    self.inner.lock().unwrap().state == State::Open
  }
}

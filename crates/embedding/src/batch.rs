use std::sync::Arc;
use std::sync::Mutex;

use sysinfo::{Pid, System};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const DEFAULT_WORKER_MAX_MEMORY_MB: u64 = 2048;
const DEFAULT_MEMORY_PRESSURE_PCT: u8 = 80;
const DEFAULT_MEMORY_CRITICAL_PCT: u8 = 90;

/// Bounds how large an embedding batch may grow, shrinking as this process's
/// resident set approaches `worker_max_memory_mb`. At `memory_pressure_pct`
/// the ceiling halves, at `memory_critical_pct` it quarters, clamped to a
/// minimum of 1. Sampling failures degrade to "no pressure" rather than
/// aborting the run.
pub struct BatchSizer {
  min_batch: usize,
  max_batch: usize,
  worker_max_memory_bytes: u64,
  pressure_fraction: f64,
  critical_fraction: f64,
  pid: Pid,
  system: Mutex<System>,
}

impl BatchSizer {
  pub fn new(min_batch: usize, max_batch: usize) -> Self {
    Self::with_memory_config(min_batch, max_batch, DEFAULT_WORKER_MAX_MEMORY_MB, DEFAULT_MEMORY_PRESSURE_PCT, DEFAULT_MEMORY_CRITICAL_PCT)
  }

  pub fn with_memory_config(
    min_batch: usize,
    max_batch: usize,
    worker_max_memory_mb: u64,
    memory_pressure_pct: u8,
    memory_critical_pct: u8,
  ) -> Self {
    Self {
      min_batch: min_batch.max(1),
      max_batch: max_batch.max(min_batch.max(1)),
      worker_max_memory_bytes: worker_max_memory_mb.saturating_mul(1024 * 1024),
      pressure_fraction: memory_pressure_pct as f64 / 100.0,
      critical_fraction: memory_critical_pct as f64 / 100.0,
      pid: Pid::from_u32(std::process::id()),
      system: Mutex::new(System::new()),
    }
  }

  /// Current recommended batch size given live memory pressure.
  pub fn current_batch_size(&self) -> usize {
    let used_fraction = match self.sample_memory_used_fraction() {
      Some(fraction) => fraction,
      None => {
        warn!("memory sampling failed, assuming no pressure");
        0.0
      }
    };

    let size = if used_fraction >= self.critical_fraction {
      self.max_batch / 4
    } else if used_fraction >= self.pressure_fraction {
      self.max_batch / 2
    } else {
      self.max_batch
    };

    size.max(self.min_batch).min(self.max_batch).max(1)
  }

  /// This process's resident set size against `worker_max_memory_bytes`,
  /// not whole-system memory pressure — a worker process competing with
  /// unrelated processes on the same host should size batches off its own
  /// footprint.
  fn sample_memory_used_fraction(&self) -> Option<f64> {
    if self.worker_max_memory_bytes == 0 {
      return None;
    }
    let mut system = self.system.lock().unwrap();
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
    let process = system.process(self.pid)?;
    Some(process.memory() as f64 / self.worker_max_memory_bytes as f64)
  }

  /// Splits `items` into chunks honoring the current pressure-adjusted
  /// batch size.
  pub fn chunk<T: Clone>(&self, items: &[T]) -> Vec<Vec<T>> {
    let size = self.current_batch_size();
    items.chunks(size).map(|chunk| chunk.to_vec()).collect()
  }
}

impl Default for BatchSizer {
  fn default() -> Self {
    Self::new(32, 128)
  }
}

/// Process-wide cap on concurrently in-flight embedding batches, shared
/// across every provider call site in the pipeline.
#[derive(Clone)]
pub struct BatchConcurrency {
  semaphore: Arc<Semaphore>,
}

impl BatchConcurrency {
  pub fn new(max_concurrent_batches: usize) -> Self {
    Self { semaphore: Arc::new(Semaphore::new(max_concurrent_batches.max(1))) }
  }

  pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
    self.semaphore.clone().acquire_owned().await.expect("batch concurrency semaphore closed unexpectedly")
  }
}

impl Default for BatchConcurrency {
  fn default() -> Self {
    debug!("using default batch concurrency of 4");
    Self::new(4)
  }
}

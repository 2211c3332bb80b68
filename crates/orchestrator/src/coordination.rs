//! Single-instance coordination: at most one orchestrator drives a given
//! repository root at a time on one host, enforced with a lock file keyed
//! by the canonicalized root and reclaimed if its owning process died.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum CoordinationError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

/// Lock file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorLock {
  pub job_id: String,
  pub repository_root: String,
  pub pid: u32,
  pub started_at: u64,
  pub last_activity: u64,
}

impl OrchestratorLock {
  pub fn new(job_id: &str, repository_root: &str) -> Self {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    Self { job_id: job_id.to_string(), repository_root: repository_root.to_string(), pid: std::process::id(), started_at: now, last_activity: now }
  }
}

/// Arbitrates one lock file per repository root, under a configurable
/// locks directory.
pub struct RepositoryCoordinator {
  locks_dir: PathBuf,
}

impl RepositoryCoordinator {
  pub fn new(locks_dir: PathBuf) -> Self {
    Self { locks_dir }
  }

  pub fn lock_path(&self, repository_root: &Path) -> PathBuf {
    self.locks_dir.join(format!("{}.lock", root_hash(repository_root)))
  }

  /// Acquires the lock for `repository_root`. Returns `Ok(true)` if this
  /// call acquired it, `Ok(false)` if a live process already holds it. A
  /// lock left by a process that is no longer running is treated as stale
  /// and reclaimed.
  pub fn try_acquire(&self, job_id: &str, repository_root: &Path) -> Result<bool, CoordinationError> {
    fs::create_dir_all(&self.locks_dir)?;
    let lock_path = self.lock_path(repository_root);

    if lock_path.exists() {
      match self.read_lock(&lock_path) {
        Ok(existing) => {
          if is_process_running(existing.pid) {
            debug!(pid = existing.pid, root = %existing.repository_root, "repository locked by live process");
            return Ok(false);
          }
          info!(pid = existing.pid, "reclaiming stale orchestrator lock");
          fs::remove_file(&lock_path)?;
        }
        Err(err) => {
          warn!(error = %err, "corrupted orchestrator lock, removing");
          fs::remove_file(&lock_path)?;
        }
      }
    }

    let lock = OrchestratorLock::new(job_id, &repository_root.to_string_lossy());
    self.write_lock(&lock_path, &lock)?;
    Ok(true)
  }

  /// Releases the lock, but only if this process owns it.
  pub fn release(&self, repository_root: &Path) -> Result<(), CoordinationError> {
    let lock_path = self.lock_path(repository_root);
    if !lock_path.exists() {
      return Ok(());
    }
    if let Ok(lock) = self.read_lock(&lock_path)
      && lock.pid == std::process::id()
    {
      fs::remove_file(&lock_path)?;
    }
    Ok(())
  }

  pub fn update_activity(&self, repository_root: &Path) -> Result<(), CoordinationError> {
    let lock_path = self.lock_path(repository_root);
    if !lock_path.exists() {
      return Ok(());
    }
    let mut lock = self.read_lock(&lock_path)?;
    if lock.pid != std::process::id() {
      return Ok(());
    }
    lock.last_activity = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    self.write_lock(&lock_path, &lock)
  }

  pub fn is_locked(&self, repository_root: &Path) -> Result<bool, CoordinationError> {
    let lock_path = self.lock_path(repository_root);
    if !lock_path.exists() {
      return Ok(false);
    }
    Ok(is_process_running(self.read_lock(&lock_path)?.pid))
  }

  fn read_lock(&self, path: &Path) -> Result<OrchestratorLock, CoordinationError> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(serde_json::from_str(&contents)?)
  }

  fn write_lock(&self, path: &Path, lock: &OrchestratorLock) -> Result<(), CoordinationError> {
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    file.write_all(serde_json::to_string_pretty(lock)?.as_bytes())?;
    file.sync_all()?;
    Ok(())
  }
}

fn root_hash(path: &Path) -> String {
  let mut hasher = Sha256::new();
  hasher.update(path.to_string_lossy().as_bytes());
  hex::encode(&hasher.finalize()[..8])
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
  unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(windows)]
fn is_process_running(pid: u32) -> bool {
  use windows_sys::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
  use windows_sys::Win32::System::Threading::{GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION};

  unsafe {
    let handle = OpenProcess(PROCESS_QUERY_INFORMATION, 0, pid);
    if handle.is_null() {
      return false;
    }
    let mut exit_code = 0;
    let result = GetExitCodeProcess(handle, &mut exit_code);
    CloseHandle(handle);
    result != 0 && exit_code == STILL_ACTIVE
  }
}

#[cfg(not(any(unix, windows)))]
fn is_process_running(_pid: u32) -> bool {
  true
}

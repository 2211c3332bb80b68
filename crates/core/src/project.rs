use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Finds the git root directory by walking upward from the given path.
pub fn find_git_root(path: &Path) -> Option<PathBuf> {
  let mut current = path.to_path_buf();

  loop {
    let git_dir = current.join(".git");
    if git_dir.exists() {
      return Some(current);
    }

    if !current.pop() {
      return None;
    }
  }
}

/// Resolves the repository root, preferring the git root over the given path.
pub fn resolve_project_path(path: &Path) -> PathBuf {
  let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
  find_git_root(&canonical).unwrap_or(canonical)
}

/// Stable identity for a repository root, used to key lock files and
/// per-repository data directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
  /// Derives an id from a path, resolving to the git root first for stability
  /// across subdirectories.
  pub fn from_path(path: &Path) -> Self {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let project_path = find_git_root(&canonical).unwrap_or(canonical);
    ProjectId(Self::hash_path(&project_path))
  }

  /// Derives an id from the exact path given, with no git-root resolution.
  pub fn from_path_exact(path: &Path) -> Self {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    ProjectId(Self::hash_path(&canonical))
  }

  fn hash_path(path: &Path) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hex::encode(&hasher.finalize()[..8])
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn data_dir(&self, base: &Path) -> PathBuf {
    base.join("repositories").join(&self.0)
  }
}

impl std::fmt::Display for ProjectId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

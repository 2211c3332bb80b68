//! Walks a repository root into the job's deterministic `processing_order`.

use std::path::Path;

use ignore::WalkBuilder;
use rayon::prelude::*;
use repodex_core::JobType;
use store::RepoDb;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
  #[error("walk error: {0}")]
  Walk(#[from] ignore::Error),
  #[error("store error: {0}")]
  Store(#[from] store::DbError),
}

/// One discovered file, prior to chunking.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
  pub path: String,
  pub size_bytes: u64,
}

/// Walks `repository_root`, applying include-then-exclude glob filtering and
/// (for incremental jobs) skipping files already completed in a prior run.
/// Returns files sorted by absolute path — the ordering `processing_order`
/// is built from.
pub async fn discover(
  store: &RepoDb,
  job_id: uuid::Uuid,
  job_type: JobType,
  repository_root: &str,
  include_patterns: &[String],
  exclude_patterns: &[String],
  force_reindex: bool,
) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
  let root = Path::new(repository_root).to_path_buf();
  let includes = compile_patterns(include_patterns);
  let excludes = compile_patterns(exclude_patterns);

  let walked = tokio::task::spawn_blocking(move || walk(&root, &includes, &excludes))
    .await
    .expect("discovery walk task panicked")?;

  let mut files = walked;

  if job_type == JobType::Incremental && !force_reindex {
    let completed = completed_paths(store, job_id, repository_root).await?;
    files.retain(|f| !completed.contains(&f.path));
  }

  files.sort_by(|a, b| a.path.cmp(&b.path));
  Ok(files)
}

fn walk(root: &Path, includes: &[glob::Pattern], excludes: &[glob::Pattern]) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
  let walker = WalkBuilder::new(root)
    .follow_links(false)
    .hidden(true)
    .git_ignore(true)
    .git_global(true)
    .git_exclude(true)
    .add_custom_ignore_filename(".repodexignore")
    .build();

  let entries: Vec<_> = walker.filter_map(|e| e.ok()).collect();

  let files: Vec<DiscoveredFile> = entries
    .into_par_iter()
    .filter_map(|entry| {
      if entry.file_type().is_none_or(|ft| ft.is_dir()) {
        return None;
      }
      let path = entry.path();
      let relative = path.strip_prefix(root).unwrap_or(path);

      if !includes.is_empty() && !includes.iter().any(|p| p.matches_path(relative)) {
        return None;
      }
      if excludes.iter().any(|p| p.matches_path(relative)) {
        return None;
      }

      let metadata = entry.metadata().ok()?;
      Some(DiscoveredFile { path: path.to_string_lossy().into_owned(), size_bytes: metadata.len() })
    })
    .collect();

  Ok(files)
}

fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
  patterns.iter().filter_map(|p| glob::Pattern::new(p).ok()).collect()
}

/// Completed files from prior jobs against the same repository root. A
/// fresh incremental job has no file_states of its own yet, so "completed
/// in a prior run" has to be read from earlier jobs, not this one.
async fn completed_paths(
  store: &RepoDb,
  job_id: uuid::Uuid,
  repository_root: &str,
) -> Result<std::collections::HashSet<String>, DiscoveryError> {
  let prior_jobs = store.list_recent_jobs(usize::MAX).await?;
  let mut paths = std::collections::HashSet::new();

  for prior in prior_jobs {
    if prior.id == job_id || prior.repository_root != repository_root {
      continue;
    }
    let completed = store.list_files_by_status(prior.id, repodex_core::FileStatus::Completed, usize::MAX).await?;
    paths.extend(completed.into_iter().map(|f| f.path));
  }

  Ok(paths)
}

/// Canonical form of a repository root, matching what [`crate::coordination`]
/// keys its lock files on.
pub fn canonicalize_root(repository_root: &str) -> std::path::PathBuf {
  Path::new(repository_root).canonicalize().unwrap_or_else(|_| Path::new(repository_root).to_path_buf())
}

/// Extracts the file paths in discovery order — this is the job's
/// `processing_order`.
pub fn processing_order(files: &[DiscoveredFile]) -> Vec<String> {
  files.iter().map(|f| f.path.clone()).collect()
}

use lancedb::{Connection, connect};
use repodex_core::ProjectId;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::{
  DEFAULT_VECTOR_DIM, dead_letter_entries_schema, embedding_cache_entries_schema, file_states_schema, jobs_schema,
  repository_snapshots_schema,
};

#[derive(Error, Debug)]
pub enum DbError {
  #[error("LanceDB error: {0}")]
  Lance(#[from] lancedb::Error),
  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("Conflict: {0}")]
  Conflict(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for repodex_core::Error {
  fn from(err: DbError) -> Self {
    match err {
      DbError::NotFound(msg) => repodex_core::Error::new(repodex_core::ErrorKind::NotFound, msg),
      DbError::Conflict(msg) => repodex_core::Error::new(repodex_core::ErrorKind::Conflict, msg),
      other => repodex_core::Error::with_source(repodex_core::ErrorKind::Internal, other.to_string(), other),
    }
  }
}

/// Durable connection for one repository's indexing state.
pub struct RepoDb {
  pub project_id: ProjectId,
  pub path: PathBuf,
  pub connection: Connection,
  pub vector_dim: usize,
  /// Serializes [`crate::jobs::RepoDb::transition_job`]'s read-modify-write
  /// against concurrent callers racing on the same job id.
  pub(crate) transition_lock: tokio::sync::Mutex<()>,
}

impl RepoDb {
  /// Opens (creating if absent) the database for a repository, under the
  /// platform data directory.
  pub async fn open(project_id: ProjectId, base_path: &std::path::Path) -> Result<Self> {
    let db_path = project_id.data_dir(base_path).join("lancedb");
    Self::open_at_path(project_id, db_path, DEFAULT_VECTOR_DIM).await
  }

  /// Opens (creating if absent) the database at an explicit path.
  pub async fn open_at_path(project_id: ProjectId, db_path: PathBuf, vector_dim: usize) -> Result<Self> {
    if let Some(parent) = db_path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    info!(?db_path, "opening repository database");
    let connection = connect(db_path.to_string_lossy().as_ref()).execute().await?;

    let db = Self { project_id, path: db_path, connection, vector_dim, transition_lock: tokio::sync::Mutex::new(()) };
    db.ensure_tables().await?;
    Ok(db)
  }

  async fn ensure_tables(&self) -> Result<()> {
    let table_names = self.connection.table_names().execute().await?;

    if !table_names.contains(&"jobs".to_string()) {
      debug!("creating jobs table");
      self.connection.create_empty_table("jobs", jobs_schema()).execute().await?;
    }

    if !table_names.contains(&"file_states".to_string()) {
      debug!("creating file_states table");
      self.connection.create_empty_table("file_states", file_states_schema()).execute().await?;
    }

    if !table_names.contains(&"repository_snapshots".to_string()) {
      debug!("creating repository_snapshots table");
      self
        .connection
        .create_empty_table("repository_snapshots", repository_snapshots_schema())
        .execute()
        .await?;
    }

    if !table_names.contains(&"embedding_cache_entries".to_string()) {
      debug!("creating embedding_cache_entries table");
      self
        .connection
        .create_empty_table("embedding_cache_entries", embedding_cache_entries_schema(self.vector_dim))
        .execute()
        .await?;
    }

    if !table_names.contains(&"dead_letter_entries".to_string()) {
      debug!("creating dead_letter_entries table");
      self
        .connection
        .create_empty_table("dead_letter_entries", dead_letter_entries_schema())
        .execute()
        .await?;
    }

    Ok(())
  }

  pub async fn jobs_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("jobs").execute().await?)
  }

  pub async fn file_states_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("file_states").execute().await?)
  }

  pub async fn repository_snapshots_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("repository_snapshots").execute().await?)
  }

  pub async fn embedding_cache_entries_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("embedding_cache_entries").execute().await?)
  }

  pub async fn dead_letter_entries_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("dead_letter_entries").execute().await?)
  }
}

/// Default base path for repodex data.
///
/// Respects (in order of precedence): `REPODEX_DATA_DIR`, `XDG_DATA_HOME`,
/// then the platform default from `dirs::data_local_dir()`.
pub fn default_data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("REPODEX_DATA_DIR") {
    return PathBuf::from(dir);
  }
  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return PathBuf::from(xdg_data).join("repodex");
  }
  dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("repodex")
}

/// Default cache directory for repodex, following the same precedence as
/// [`default_data_dir`] but rooted at the platform cache directory.
pub fn default_cache_dir() -> PathBuf {
  if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME") {
    return PathBuf::from(xdg_cache).join("repodex");
  }
  dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("repodex")
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;
  use std::sync::Mutex;
  use tempfile::TempDir;

  static ENV_MUTEX: Mutex<()> = Mutex::new(());

  #[tokio::test]
  async fn test_open_database() {
    let temp_dir = TempDir::new().unwrap();
    let project_id = ProjectId::from_path(Path::new("/test/repo"));

    let db = RepoDb::open_at_path(project_id.clone(), temp_dir.path().join("test.lancedb"), 768).await.unwrap();

    assert_eq!(db.project_id.as_str(), project_id.as_str());
  }

  #[tokio::test]
  async fn test_tables_created() {
    let temp_dir = TempDir::new().unwrap();
    let project_id = ProjectId::from_path(Path::new("/test/repo"));

    let db = RepoDb::open_at_path(project_id, temp_dir.path().join("test.lancedb"), 768).await.unwrap();

    let tables = db.connection.table_names().execute().await.unwrap();
    assert!(tables.contains(&"jobs".to_string()));
    assert!(tables.contains(&"file_states".to_string()));
    assert!(tables.contains(&"repository_snapshots".to_string()));
    assert!(tables.contains(&"embedding_cache_entries".to_string()));
    assert!(tables.contains(&"dead_letter_entries".to_string()));
  }

  #[test]
  fn test_env_override_data_dir() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let original = std::env::var("REPODEX_DATA_DIR").ok();

    unsafe {
      std::env::set_var("REPODEX_DATA_DIR", "/custom/data/path");
    }
    let dir = default_data_dir();
    assert_eq!(dir, PathBuf::from("/custom/data/path"));

    if let Some(orig) = original {
      unsafe {
        std::env::set_var("REPODEX_DATA_DIR", orig);
      }
    } else {
      unsafe {
        std::env::remove_var("REPODEX_DATA_DIR");
      }
    }
  }

  #[test]
  fn test_xdg_data_home() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let original_data_dir = std::env::var("REPODEX_DATA_DIR").ok();
    let original_xdg = std::env::var("XDG_DATA_HOME").ok();

    unsafe {
      std::env::remove_var("REPODEX_DATA_DIR");
    }
    unsafe {
      std::env::set_var("XDG_DATA_HOME", "/xdg/data");
    }
    let dir = default_data_dir();
    assert_eq!(dir, PathBuf::from("/xdg/data/repodex"));

    if let Some(orig) = original_data_dir {
      unsafe {
        std::env::set_var("REPODEX_DATA_DIR", orig);
      }
    }
    if let Some(orig) = original_xdg {
      unsafe {
        std::env::set_var("XDG_DATA_HOME", orig);
      }
    } else {
      unsafe {
        std::env::remove_var("XDG_DATA_HOME");
      }
    }
  }
}

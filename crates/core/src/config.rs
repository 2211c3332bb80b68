//! Layered configuration: compiled-in defaults < project config file <
//! environment variables < explicit construction-time values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File and byte limits the orchestrator uses to partition `processing_order`
/// into chunks, plus the cap on chunks a single worker runs concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
  pub max_files_per_chunk: usize,
  pub max_bytes_per_chunk: u64,
  pub max_concurrent_chunks: usize,
}

impl Default for ChunkingConfig {
  fn default() -> Self {
    Self { max_files_per_chunk: 50, max_bytes_per_chunk: 10 * 1024 * 1024, max_concurrent_chunks: 3 }
  }
}

/// Embedding provider settings: endpoint identity, batching, retry, and
/// rate-limit parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
  pub endpoint_url: String,
  pub model_id: String,
  pub dimensions: usize,

  pub embed_max_concurrency: usize,
  pub embed_min_batch: usize,
  pub embed_max_batch: usize,
  pub embed_max_content_length: usize,
  pub embed_max_retries: u32,
  pub requests_per_minute: u32,
  pub embed_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      endpoint_url: "http://localhost:8080/embed".to_string(),
      model_id: "reference-embedder-v1".to_string(),
      dimensions: 1024,
      embed_max_concurrency: 4,
      embed_min_batch: 32,
      embed_max_batch: 128,
      embed_max_content_length: 8000,
      embed_max_retries: 3,
      requests_per_minute: 100,
      embed_timeout_secs: 30,
    }
  }
}

/// Per-endpoint circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
  pub failure_threshold: u32,
  pub recovery_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
  fn default() -> Self {
    Self { failure_threshold: 5, recovery_timeout_secs: 60 }
  }
}

/// Resident-set memory pressure thresholds that drive dynamic batch sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
  pub worker_max_memory_mb: u64,
  pub memory_pressure_pct: u8,
  pub memory_critical_pct: u8,
}

impl Default for MemoryConfig {
  fn default() -> Self {
    Self { worker_max_memory_mb: 2048, memory_pressure_pct: 80, memory_critical_pct: 90 }
  }
}

/// Hot-tier embedding cache lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub cache_ttl_hours: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self { cache_ttl_hours: 168 }
  }
}

/// Job-level abort rule: transition to FAILED once enough files have been
/// attempted and too large a fraction of them failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbortConfig {
  pub abort_failure_rate: f64,
  pub abort_min_samples: u64,
}

impl Default for AbortConfig {
  fn default() -> Self {
    Self { abort_failure_rate: 0.5, abort_min_samples: 10 }
  }
}

/// Aggregate configuration for a repodex worker process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub chunking: ChunkingConfig,
  pub embedding: EmbeddingConfig,
  pub circuit_breaker: CircuitBreakerConfig,
  pub memory: MemoryConfig,
  pub cache: CacheConfig,
  pub abort: AbortConfig,
}

impl Config {
  /// Loads configuration in precedence order: compiled defaults, then a
  /// project config file (`<repository_root>/.repodex/config.toml`), then a
  /// user config file, then recognized environment variable overrides.
  pub fn load_layered(repository_root: &Path) -> Self {
    let mut config = Self::default();

    if let Some(project_config) = Self::read_toml(&Self::project_config_path(repository_root)) {
      config = project_config;
    } else if let Some(user_config_path) = Self::user_config_path()
      && let Some(user_config) = Self::read_toml(&user_config_path)
    {
      config = user_config;
    }

    config.apply_env_overrides();
    config
  }

  fn read_toml(path: &Path) -> Option<Self> {
    if !path.exists() {
      return None;
    }
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
  }

  /// Applies `REPODEX_*` environment variable overrides on top of whatever
  /// was loaded from a config file. Malformed values are ignored, leaving
  /// the file/default value in place.
  fn apply_env_overrides(&mut self) {
    if let Some(v) = env_parsed("REPODEX_MAX_FILES_PER_CHUNK") {
      self.chunking.max_files_per_chunk = v;
    }
    if let Some(v) = env_parsed("REPODEX_MAX_BYTES_PER_CHUNK") {
      self.chunking.max_bytes_per_chunk = v;
    }
    if let Some(v) = env_parsed("REPODEX_EMBED_MAX_CONCURRENCY") {
      self.embedding.embed_max_concurrency = v;
    }
    if let Some(v) = env_parsed("REPODEX_REQUESTS_PER_MINUTE") {
      self.embedding.requests_per_minute = v;
    }
    if let Some(v) = env_parsed("REPODEX_WORKER_MAX_MEMORY_MB") {
      self.memory.worker_max_memory_mb = v;
    }
    if let Ok(v) = std::env::var("REPODEX_ENDPOINT_URL") {
      self.embedding.endpoint_url = v;
    }
  }

  pub fn project_config_path(repository_root: &Path) -> PathBuf {
    repository_root.join(".repodex").join("config.toml")
  }

  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("REPODEX_CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("repodex").join("config.toml"));
    }
    dirs::config_dir().map(|p: PathBuf| p.join("repodex").join("config.toml"))
  }

  /// Produces a fully commented starter config, suitable for writing to
  /// `.repodex/config.toml` in a new repository.
  pub fn generate_template() -> String {
    let defaults = Self::default();
    format!(
      r#"# repodex worker configuration
# Place at .repodex/config.toml in the repository root, or at the user
# config path reported by `repodex config path`.

[chunking]
# File count cap per chunk.
max_files_per_chunk = {max_files_per_chunk}
# Total byte cap per chunk.
max_bytes_per_chunk = {max_bytes_per_chunk}
# Upper bound on chunks a single worker runs concurrently.
max_concurrent_chunks = {max_concurrent_chunks}

[embedding]
endpoint_url = "{endpoint_url}"
model_id = "{model_id}"
dimensions = {dimensions}
embed_max_concurrency = {embed_max_concurrency}
embed_min_batch = {embed_min_batch}
embed_max_batch = {embed_max_batch}
embed_max_content_length = {embed_max_content_length}
embed_max_retries = {embed_max_retries}
requests_per_minute = {requests_per_minute}
embed_timeout_secs = {embed_timeout_secs}

[circuit_breaker]
failure_threshold = {failure_threshold}
recovery_timeout_secs = {recovery_timeout_secs}

[memory]
worker_max_memory_mb = {worker_max_memory_mb}
memory_pressure_pct = {memory_pressure_pct}
memory_critical_pct = {memory_critical_pct}

[cache]
cache_ttl_hours = {cache_ttl_hours}

[abort]
abort_failure_rate = {abort_failure_rate}
abort_min_samples = {abort_min_samples}
"#,
      max_files_per_chunk = defaults.chunking.max_files_per_chunk,
      max_bytes_per_chunk = defaults.chunking.max_bytes_per_chunk,
      max_concurrent_chunks = defaults.chunking.max_concurrent_chunks,
      endpoint_url = defaults.embedding.endpoint_url,
      model_id = defaults.embedding.model_id,
      dimensions = defaults.embedding.dimensions,
      embed_max_concurrency = defaults.embedding.embed_max_concurrency,
      embed_min_batch = defaults.embedding.embed_min_batch,
      embed_max_batch = defaults.embedding.embed_max_batch,
      embed_max_content_length = defaults.embedding.embed_max_content_length,
      embed_max_retries = defaults.embedding.embed_max_retries,
      requests_per_minute = defaults.embedding.requests_per_minute,
      embed_timeout_secs = defaults.embedding.embed_timeout_secs,
      failure_threshold = defaults.circuit_breaker.failure_threshold,
      recovery_timeout_secs = defaults.circuit_breaker.recovery_timeout_secs,
      worker_max_memory_mb = defaults.memory.worker_max_memory_mb,
      memory_pressure_pct = defaults.memory.memory_pressure_pct,
      memory_critical_pct = defaults.memory.memory_critical_pct,
      cache_ttl_hours = defaults.cache.cache_ttl_hours,
      abort_failure_rate = defaults.abort.abort_failure_rate,
      abort_min_samples = defaults.abort.abort_min_samples,
    )
  }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
  std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;
  use tempfile::TempDir;

  static ENV_MUTEX: Mutex<()> = Mutex::new(());

  #[test]
  fn defaults_match_spec_values() {
    let config = Config::default();
    assert_eq!(config.chunking.max_files_per_chunk, 50);
    assert_eq!(config.chunking.max_bytes_per_chunk, 10 * 1024 * 1024);
    assert_eq!(config.embedding.embed_max_concurrency, 4);
    assert_eq!(config.embedding.embed_min_batch, 32);
    assert_eq!(config.embedding.embed_max_batch, 128);
    assert_eq!(config.circuit_breaker.failure_threshold, 5);
    assert_eq!(config.circuit_breaker.recovery_timeout_secs, 60);
    assert_eq!(config.memory.worker_max_memory_mb, 2048);
    assert_eq!(config.embedding.embed_timeout_secs, 30);
    assert_eq!(config.abort.abort_failure_rate, 0.5);
    assert_eq!(config.abort.abort_min_samples, 10);
  }

  #[test]
  fn load_layered_falls_back_to_defaults_with_nothing_present() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let temp = TempDir::new().unwrap();
    let config = Config::load_layered(temp.path());
    assert_eq!(config.chunking.max_files_per_chunk, 50);
  }

  #[test]
  fn load_layered_reads_project_config_file() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join(".repodex")).unwrap();
    std::fs::write(
      Config::project_config_path(temp.path()),
      "[chunking]\nmax_files_per_chunk = 10\n",
    )
    .unwrap();

    let config = Config::load_layered(temp.path());
    assert_eq!(config.chunking.max_files_per_chunk, 10);
  }

  #[test]
  fn env_override_wins_over_file_value() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join(".repodex")).unwrap();
    std::fs::write(
      Config::project_config_path(temp.path()),
      "[chunking]\nmax_files_per_chunk = 10\n",
    )
    .unwrap();
    unsafe {
      std::env::set_var("REPODEX_MAX_FILES_PER_CHUNK", "7");
    }

    let config = Config::load_layered(temp.path());
    assert_eq!(config.chunking.max_files_per_chunk, 7);

    unsafe {
      std::env::remove_var("REPODEX_MAX_FILES_PER_CHUNK");
    }
  }

  #[test]
  fn generate_template_contains_every_section() {
    let template = Config::generate_template();
    assert!(template.contains("[chunking]"));
    assert!(template.contains("[embedding]"));
    assert!(template.contains("[circuit_breaker]"));
    assert!(template.contains("[memory]"));
    assert!(template.contains("[cache]"));
    assert!(template.contains("[abort]"));
  }

  #[test]
  fn toml_roundtrip_preserves_overrides() {
    let mut config = Config::default();
    config.chunking.max_files_per_chunk = 99;
    config.embedding.dimensions = 768;

    let toml_str = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&toml_str).unwrap();

    assert_eq!(parsed.chunking.max_files_per_chunk, 99);
    assert_eq!(parsed.embedding.dimensions, 768);
  }
}

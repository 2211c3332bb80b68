//! Command-line front end over the job-control operations: submit a job,
//! inspect its status, pause/resume/cancel it, and list recent jobs for a
//! repository. A thin caller of [`orchestrator::JobOrchestrator`], not part
//! of the core's contract.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cache::EmbeddingCache;
use clap::{Parser, Subcommand};
use embedding::{BatchSizer, EmbeddingPipeline, EmbeddingProvider, HttpEmbeddingProvider, RateLimiter, RetryPolicy};
use indexer::{Indexer, InMemorySink};
use orchestrator::{ChunkingLimits, JobOrchestrator, RepositoryCoordinator};
use parser::ParserRegistry;
use repodex_core::{Config, Job, JobSpec, JobStatus, JobType, ProjectId};
use store::RepoDb;
use uuid::Uuid;

/// Cap on entries held in the volatile hot cache tier. Not one of the
/// recognized configuration options in the layered config (those govern
/// the durable/provider side); fixed here for the reference binary.
const MAX_HOT_CACHE_ENTRIES: u64 = 10_000;

#[derive(Parser)]
#[command(name = "repodex")]
#[command(about = "Fault-tolerant repository indexing engine")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Submit a new indexing job for a repository root
  Submit {
    /// Repository root to index
    #[arg(long)]
    root: PathBuf,
    /// Job type: full, incremental, or selective
    #[arg(long = "type", default_value = "full")]
    job_type: String,
    /// Glob pattern to include; may be passed multiple times
    #[arg(long = "include")]
    include_patterns: Vec<String>,
    /// Glob pattern to exclude; may be passed multiple times
    #[arg(long = "exclude")]
    exclude_patterns: Vec<String>,
    /// Re-index files already completed by a prior incremental job
    #[arg(long)]
    force: bool,
  },
  /// Show a job's status, progress, and checkpoint summary
  Status {
    job_id: Uuid,
    /// Repository root the job belongs to (selects its database)
    #[arg(long)]
    root: PathBuf,
  },
  /// Pause a running job; observed at the next chunk boundary
  Pause {
    job_id: Uuid,
    #[arg(long)]
    root: PathBuf,
  },
  /// Resume a pending or paused job, driving it to completion
  Resume {
    job_id: Uuid,
    #[arg(long)]
    root: PathBuf,
  },
  /// Cancel a job; the unprocessed suffix is left untouched
  Cancel {
    job_id: Uuid,
    #[arg(long)]
    root: PathBuf,
  },
  /// List recent jobs for a repository
  List {
    #[arg(long)]
    root: PathBuf,
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
  /// Write a starter config file with every recognized option
  ConfigInit {
    #[arg(long)]
    root: PathBuf,
  },
}

fn init_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
    .init();
}

/// Platform data directory for repodex's durable state and lock files.
fn data_dir() -> PathBuf {
  dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("repodex")
}

#[tokio::main]
async fn main() -> Result<()> {
  init_logging();
  let cli = Cli::parse();

  match cli.command {
    Commands::Submit { root, job_type, include_patterns, exclude_patterns, force } => {
      let job_type: JobType = job_type.parse().map_err(|e: String| anyhow::anyhow!(e))?;
      let orchestrator = build_orchestrator(&root).await?;
      let spec = JobSpec {
        repository_root: canonical_root(&root)?,
        job_type,
        include_patterns,
        exclude_patterns,
        force_reindex: force,
      };
      let job_id = orchestrator.submit(spec).await?;
      println!("{job_id}");
    }
    Commands::Status { job_id, root } => {
      let store = open_store(&root).await?;
      let job = store.get_job(job_id).await?.ok_or_else(|| anyhow::anyhow!("job {job_id} not found"))?;
      print_job(&job);
    }
    Commands::Pause { job_id, root } => {
      let orchestrator = build_orchestrator(&root).await?;
      let paused = orchestrator.pause(job_id).await?;
      println!("{paused}");
    }
    Commands::Resume { job_id, root } => {
      let orchestrator = build_orchestrator(&root).await?;
      orchestrator.resume(job_id).await.context("resume failed")?;
      let store = open_store(&root).await?;
      if let Some(job) = store.get_job(job_id).await? {
        print_job(&job);
      }
    }
    Commands::Cancel { job_id, root } => {
      let orchestrator = build_orchestrator(&root).await?;
      let cancelled = orchestrator.cancel(job_id).await?;
      println!("{cancelled}");
    }
    Commands::List { root, limit } => {
      let store = open_store(&root).await?;
      let jobs = store.list_recent_jobs(limit).await?;
      if jobs.is_empty() {
        println!("No jobs found for {}", root.display());
      }
      for job in &jobs {
        println!(
          "{}  {:<11}  {:<9}  {}/{} processed  {}",
          job.id,
          job.job_type.as_str(),
          job.status.as_str(),
          job.processed_files,
          job.total_files,
          job.created_at.to_rfc3339(),
        );
      }
    }
    Commands::ConfigInit { root } => {
      let path = Config::project_config_path(&root);
      if path.exists() {
        bail!("config file already exists: {}", path.display());
      }
      if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::write(&path, Config::generate_template())?;
      println!("Wrote {}", path.display());
    }
  }

  Ok(())
}

fn print_job(job: &Job) {
  println!("id:              {}", job.id);
  println!("repository_root: {}", job.repository_root);
  println!("type:            {}", job.job_type.as_str());
  println!("status:          {}", job.status.as_str());
  println!("progress:        {:.1}%", job.progress_fraction() * 100.0);
  println!("processed:       {}", job.processed_files);
  println!("failed:          {}", job.failed_files);
  println!("skipped:         {}", job.skipped_files);
  println!("total:           {}", job.total_files);
  match job.success_rate() {
    Some(rate) => println!("success_rate:    {rate:.3}"),
    None => println!("success_rate:    n/a (fewer than 10 files attempted)"),
  }
  if let Some(checkpoint) = &job.checkpoint {
    println!(
      "checkpoint:      index={} chunk_size={} chunk_failed={}",
      checkpoint.index_in_processing_order, checkpoint.chunk_size, checkpoint.chunk_failed
    );
  }
  if let Some(error_message) = &job.error_message {
    println!("error:           {error_message}");
  }
  if job.status == JobStatus::Completed || job.status == JobStatus::Failed || job.status == JobStatus::Cancelled {
    if let Some(seconds) = job.duration_seconds() {
      println!("duration:        {seconds}s");
    }
  }
}

fn canonical_root(root: &Path) -> Result<String> {
  let canonical = root.canonicalize().with_context(|| format!("repository root not found: {}", root.display()))?;
  Ok(canonical.to_string_lossy().into_owned())
}

async fn open_store(root: &Path) -> Result<RepoDb> {
  let project_id = ProjectId::from_path(root);
  RepoDb::open(project_id, &data_dir()).await.context("failed to open repository database")
}

async fn build_orchestrator(root: &Path) -> Result<JobOrchestrator> {
  let config = Config::load_layered(root);
  let store = Arc::new(open_store(root).await?);

  let endpoint = config.embedding.endpoint_url.clone();
  let provider: Arc<dyn EmbeddingProvider> = Arc::new(
    HttpEmbeddingProvider::new()
      .with_url(endpoint.clone())
      .with_model(config.embedding.model_id.clone(), config.embedding.dimensions)
      .with_concurrency(config.embedding.embed_max_concurrency)
      .with_timeout(Duration::from_secs(config.embedding.embed_timeout_secs)),
  );
  let cache = Arc::new(EmbeddingCache::new(store.clone(), MAX_HOT_CACHE_ENTRIES, config.cache.cache_ttl_hours));
  let batch_sizer = BatchSizer::with_memory_config(
    config.embedding.embed_min_batch,
    config.embedding.embed_max_batch,
    config.memory.worker_max_memory_mb,
    config.memory.memory_pressure_pct,
    config.memory.memory_critical_pct,
  );
  let pipeline = Arc::new(
    EmbeddingPipeline::new(provider, cache)
      .with_max_content_length(config.embedding.embed_max_content_length)
      .with_rate_limiter(RateLimiter::new(endpoint, config.embedding.requests_per_minute))
      .with_retry_policy(RetryPolicy { max_retries: config.embedding.embed_max_retries, ..RetryPolicy::default() })
      .with_batch_sizer(batch_sizer)
      .with_circuit_breaker(
        config.circuit_breaker.failure_threshold,
        Duration::from_secs(config.circuit_breaker.recovery_timeout_secs),
      ),
  );
  let parsers = Arc::new(ParserRegistry::with_reference_parsers());
  let sink = Arc::new(InMemorySink::new());
  let indexer = Arc::new(Indexer::new(store.clone(), parsers, pipeline, sink));
  let coordinator = Arc::new(RepositoryCoordinator::new(data_dir().join("locks")));

  let limits = ChunkingLimits {
    max_files_per_chunk: config.chunking.max_files_per_chunk,
    max_bytes_per_chunk: config.chunking.max_bytes_per_chunk,
  };

  Ok(JobOrchestrator::new(store, indexer, coordinator).with_chunking_limits(limits))
}

use criterion::{Criterion, criterion_group, criterion_main};
use repodex_core::{Job, JobSpec, JobType, ProjectId};
use std::hint::black_box;
use std::path::Path;
use store::RepoDb;
use tempfile::TempDir;

fn bench_create_and_get_job(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let temp_dir = TempDir::new().unwrap();
  let project_id = ProjectId::from_path(Path::new("/bench/repo"));
  let db = rt.block_on(async { RepoDb::open_at_path(project_id, temp_dir.path().join("bench.lancedb"), 8).await.unwrap() });

  c.bench_function("create_and_get_job", |b| {
    b.iter(|| {
      rt.block_on(async {
        let job = Job::new(JobSpec {
          repository_root: "/bench/repo".to_string(),
          job_type: JobType::Full,
          include_patterns: vec![],
          exclude_patterns: vec![],
          force_reindex: false,
        });
        db.create_job(&job).await.unwrap();
        let fetched = db.get_job(job.id).await.unwrap();
        black_box(fetched)
      })
    })
  });
}

fn bench_list_recent_jobs(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let temp_dir = TempDir::new().unwrap();
  let project_id = ProjectId::from_path(Path::new("/bench/repo"));
  let db = rt.block_on(async { RepoDb::open_at_path(project_id, temp_dir.path().join("bench.lancedb"), 8).await.unwrap() });

  rt.block_on(async {
    for _ in 0..50 {
      let job = Job::new(JobSpec {
        repository_root: "/bench/repo".to_string(),
        job_type: JobType::Full,
        include_patterns: vec![],
        exclude_patterns: vec![],
        force_reindex: false,
      });
      db.create_job(&job).await.unwrap();
    }
  });

  c.bench_function("list_recent_jobs", |b| {
    b.iter(|| rt.block_on(async { black_box(db.list_recent_jobs(10).await.unwrap()) }))
  });
}

criterion_group!(benches, bench_create_and_get_job, bench_list_recent_jobs);
criterion_main!(benches);

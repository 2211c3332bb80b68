use criterion::{Criterion, criterion_group, criterion_main};
use orchestrator::discovery::DiscoveredFile;
use orchestrator::{ChunkingLimits, chunking::chunk_files};
use std::hint::black_box;

fn bench_chunk_files(c: &mut Criterion) {
  let files: Vec<DiscoveredFile> =
    (0..5000).map(|i| DiscoveredFile { path: format!("src/file_{i}.rs"), size_bytes: 4096 }).collect();

  c.bench_function("chunk_files_5000", |b| {
    b.iter(|| black_box(chunk_files(&files, ChunkingLimits::default())))
  });
}

criterion_group!(benches, bench_chunk_files);
criterion_main!(benches);

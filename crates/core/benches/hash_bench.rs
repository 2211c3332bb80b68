use criterion::{Criterion, black_box, criterion_group, criterion_main};
use repodex_core::hash::{cache_key, content_hash, normalize_content};

fn small_content() -> String {
  "fn main() {\n    println!(\"hello\");\n}\n".repeat(5)
}

fn large_content() -> String {
  "fn handler(req: Request) -> Response {\r\n    process(req)\r\n}\r\n".repeat(2000)
}

fn bench_normalize(c: &mut Criterion) {
  let small = small_content();
  let large = large_content();

  c.bench_function("normalize_content/small", |b| b.iter(|| normalize_content(black_box(&small))));
  c.bench_function("normalize_content/large", |b| b.iter(|| normalize_content(black_box(&large))));
}

fn bench_content_hash(c: &mut Criterion) {
  let large = large_content();
  c.bench_function("content_hash/large", |b| b.iter(|| content_hash(black_box(&large))));
}

fn bench_cache_key(c: &mut Criterion) {
  let large = large_content();
  c.bench_function("cache_key/large", |b| b.iter(|| cache_key(black_box(&large), black_box("reference-embedder-v1"))));
}

criterion_group!(benches, bench_normalize, bench_content_hash, bench_cache_key);
criterion_main!(benches);

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use embedding::RetryPolicy;
use std::time::Duration;

fn bench_backoff_calculation(c: &mut Criterion) {
  let mut group = c.benchmark_group("backoff_calculation");

  for (name, policy) in [
    ("default", RetryPolicy::default()),
    (
      "tight_cap",
      RetryPolicy { max_retries: 3, base: Duration::from_millis(500), max_backoff: Duration::from_secs(2) },
    ),
  ] {
    group.bench_with_input(BenchmarkId::new("policy", name), &policy, |b, policy| {
      b.iter(|| {
        for attempt in 0..6 {
          black_box(policy.backoff_for_attempt(attempt));
        }
      });
    });
  }

  group.finish();
}

criterion_group!(benches, bench_backoff_calculation);
criterion_main!(benches);

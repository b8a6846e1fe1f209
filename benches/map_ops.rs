use criterion::{criterion_group, criterion_main, Criterion};
use expiremap::{ExpirationPolicy, ExpiringMap};

use std::hint::black_box;
use std::time::Duration;

const KEYS: u64 = 10_000;

fn bench_uniform(c: &mut Criterion) {
  let map: ExpiringMap<u64, u64> = ExpiringMap::builder()
    .expiration(Duration::from_secs(3600))
    .build()
    .unwrap();

  let mut n = 0u64;
  c.bench_function("uniform_put", |b| {
    b.iter(|| {
      map.put(black_box(n % KEYS), n);
      n += 1;
    })
  });

  for key in 0..KEYS {
    map.put(key, key);
  }
  let mut n = 0u64;
  c.bench_function("uniform_get", |b| {
    b.iter(|| {
      black_box(map.get(&(n % KEYS)));
      n += 1;
    })
  });
}

fn bench_variable(c: &mut Criterion) {
  let map: ExpiringMap<u64, u64> = ExpiringMap::builder()
    .variable_expiration()
    .build()
    .unwrap();

  let mut n = 0u64;
  c.bench_function("variable_put", |b| {
    b.iter(|| {
      let ttl = Duration::from_secs(600 + n % 600);
      map
        .put_with(black_box(n % KEYS), n, ExpirationPolicy::Created, ttl)
        .unwrap();
      n += 1;
    })
  });
}

criterion_group!(benches, bench_uniform, bench_variable);
criterion_main!(benches);

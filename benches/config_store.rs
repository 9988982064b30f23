//! Config store benchmarks.
//!
//! Run with: cargo bench --bench config_store

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hpconfd::db::{DatabaseBackend, SqliteBackend};
use hpconfd::store::{ConfigStore, Crud};
use hpconfd::types::Config;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn create_runtime() -> Runtime {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap()
}

fn seeded_store(rt: &Runtime, count: usize) -> (ConfigStore, Vec<String>) {
  rt.block_on(async {
    let backend = SqliteBackend::in_memory().await.unwrap();
    backend.init_schema().await.unwrap();
    let store = ConfigStore::new(Arc::new(backend));
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
      let conf = Config {
        set_point: 40 + (i % 20) as i32,
        ..Config::new(format!("config-{}", i))
      };
      ids.push(store.create(conf).await.unwrap());
    }
    (store, ids)
  })
}

fn bench_create(c: &mut Criterion) {
  let rt = create_runtime();
  let (store, _) = seeded_store(&rt, 0);

  let mut group = c.benchmark_group("create");
  group.throughput(Throughput::Elements(1));
  let mut n = 0u64;
  group.bench_function("unique_name", |b| {
    b.iter(|| {
      n += 1;
      rt.block_on(async {
        black_box(store.create(Config::new(format!("bench-{}", n))).await.unwrap());
      });
    });
  });
  group.finish();
}

fn bench_activate(c: &mut Criterion) {
  let rt = create_runtime();
  let mut group = c.benchmark_group("activate");

  for size in [10, 100, 1000] {
    let (store, ids) = seeded_store(&rt, size);
    let mut i = 0;
    group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
      b.iter(|| {
        i = (i + 1) % ids.len();
        rt.block_on(async {
          store.activate(&ids[i]).await.unwrap();
        });
      });
    });
  }
  group.finish();
}

fn bench_read_many(c: &mut Criterion) {
  let rt = create_runtime();
  let mut group = c.benchmark_group("read_many");

  for size in [10, 100, 1000] {
    let (store, _) = seeded_store(&rt, size);
    group.throughput(Throughput::Elements(size as u64));
    group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
      b.iter(|| {
        rt.block_on(async {
          black_box(store.read_many().await.unwrap());
        });
      });
    });
  }
  group.finish();
}

criterion_group!(benches, bench_create, bench_activate, bench_read_many);
criterion_main!(benches);

//! Store benchmarks over real files.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use herdb_bench::generate_pairs;
use herdb_core::{Config, Store};
use tempfile::TempDir;

fn open(temp_dir: &TempDir, cache_size: usize) -> Store {
    let config = Config::new()
        .segments(8)
        .initial_capacity(4096)
        .cache_size(cache_size);
    Store::open_with_config(temp_dir.path(), config).unwrap()
}

/// Benchmark batches of puts on an on-disk store.
fn bench_store_put(c: &mut Criterion) {
    let pairs = generate_pairs(1_000, 128);
    let mut group = c.benchmark_group("store_put");
    group.sample_size(20);
    group.throughput(Throughput::Elements(pairs.len() as u64));

    group.bench_function("batch_1000", |b| {
        b.iter_batched(
            || {
                let temp_dir = TempDir::new().unwrap();
                let store = open(&temp_dir, 0);
                (temp_dir, store)
            },
            |(_temp_dir, store)| {
                for (key, value) in &pairs {
                    store.put(black_box(key), black_box(value)).unwrap();
                }
            },
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

/// Benchmark gets with and without the read cache.
fn bench_store_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_get");
    let pairs = generate_pairs(10_000, 128);

    for (name, cache_size) in [("uncached", 0), ("cached", 4 * 1024 * 1024)] {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, cache_size);
        for (key, value) in &pairs {
            store.put(key, value).unwrap();
        }
        group.bench_function(name, |b| {
            let mut i = 0;
            b.iter(|| {
                let (key, _) = &pairs[i % pairs.len()];
                i += 1;
                black_box(store.get(black_box(key)).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark typed value reads through the codec.
fn bench_typed_values(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir, 0);
    store.put_value("counter", &42i64).unwrap();
    store.put_value("name", "herdb").unwrap();

    c.bench_function("store_get_value", |b| {
        b.iter(|| {
            black_box(store.get_value::<_, i64>(black_box("counter")).unwrap());
            black_box(store.get_value::<_, String>(black_box("name")).unwrap());
        });
    });
}

criterion_group!(benches, bench_store_put, bench_store_get, bench_typed_values);
criterion_main!(benches);

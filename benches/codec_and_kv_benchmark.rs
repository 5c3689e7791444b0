use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use samyama::codec::{Column, ColumnType, RowReader, SchemaBuilder, Value};
use samyama::kv::{KvEngine, KvOp};
use tempfile::TempDir;

fn row_schema(n: usize) -> samyama::codec::Schema {
    let mut b = SchemaBuilder::new(0);
    for i in 0..n {
        b = b.column(Column::new(format!("col{i:02}"), ColumnType::Int));
    }
    b.build().unwrap()
}

/// Row encode throughput at a few column counts, spanning the single- and
/// double-block-offset cases (16 columns is the block boundary).
fn bench_row_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_encode");
    for n in [4usize, 16, 33] {
        let schema = row_schema(n);
        let values: Vec<Option<Value>> = (0..n).map(|i| Some(Value::Int(i as i64))).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let encoded = samyama::codec::encode_row(&schema, &values).unwrap();
                criterion::black_box(encoded);
            });
        });
    }
    group.finish();
}

/// Decode-by-index throughput, same column-count spread as the encode bench.
fn bench_row_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_decode");
    for n in [4usize, 16, 33] {
        let schema = std::sync::Arc::new(row_schema(n));
        let values: Vec<Option<Value>> = (0..n).map(|i| Some(Value::Int(i as i64))).collect();
        let encoded = samyama::codec::encode_row(&schema, &values).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let reader = RowReader::new(schema.clone(), &encoded).unwrap();
                for i in 0..n {
                    criterion::black_box(reader.get_by_index(i).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_kv_put_get(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let engine = KvEngine::open(dir.path(), &[]).unwrap();
    engine.create_space(1).unwrap();

    let mut group = c.benchmark_group("kv_put_get");
    group.bench_function("put", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.put(1, i.to_be_bytes().to_vec(), b"value".to_vec()).unwrap();
            i += 1;
        });
    });

    engine.put(1, b"probe".to_vec(), b"value".to_vec()).unwrap();
    group.bench_function("get", |b| {
        b.iter(|| {
            criterion::black_box(engine.get(1, b"probe").unwrap());
        });
    });
    group.finish();
}

/// `atomic_batch` cost as a function of batch size.
fn bench_atomic_batch(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let engine = KvEngine::open(dir.path(), &[]).unwrap();
    engine.create_space(1).unwrap();

    let mut group = c.benchmark_group("atomic_batch");
    for size in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let ops: Vec<KvOp> = (0..size)
                    .map(|i| KvOp::Put { key: format!("k{i}").into_bytes(), value: b"v".to_vec() })
                    .collect();
                engine.atomic_batch(1, ops).unwrap();
            });
        });
    }
    group.finish();
}

/// `prefix_scan` over a fixed-size keyspace, the hot path under `get_neighbors`.
fn bench_prefix_scan(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let engine = KvEngine::open(dir.path(), &[]).unwrap();
    engine.create_space(1).unwrap();
    for i in 0u32..1000 {
        let mut key = vec![0u8, 0, 0, 1];
        key.extend_from_slice(&i.to_be_bytes());
        engine.put(1, key, b"v".to_vec()).unwrap();
    }

    c.bench_function("prefix_scan_1000_entries", |b| {
        b.iter(|| {
            let found = engine.prefix_scan(1, &[0, 0, 0, 1]).unwrap();
            criterion::black_box(found.len());
        });
    });
}

criterion_group!(
    benches,
    bench_row_encode,
    bench_row_decode,
    bench_kv_put_get,
    bench_atomic_batch,
    bench_prefix_scan,
);
criterion_main!(benches);

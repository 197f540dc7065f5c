//! Benchmarks for RowStore index seeks: re-opening a scan after an anchor
//! versus walking the index from the start.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resumedb_core::schema::TableBuilder;
use resumedb_core::{DataType, Row, Value};
use resumedb_storage::{IndexSeek, KeyRange, RowStore, ScanDirection, SeekMode};

fn create_test_schema_with_indices() -> resumedb_core::schema::Table {
    TableBuilder::new("Quote")
        .unwrap()
        .add_column("seq", DataType::Int64)
        .unwrap()
        .add_column("price", DataType::Float64)
        .unwrap()
        .add_column("sector", DataType::String)
        .unwrap()
        .add_index("idx_seq", "seq", true)
        .unwrap()
        .add_index("idx_sector", "sector", false)
        .unwrap()
        .build()
        .unwrap()
}

fn populate_store(store: &mut RowStore, count: u64) {
    let sectors = ["Tech", "Finance", "Health", "Energy", "Consumer"];
    for i in 1..=count {
        let row = Row::new(
            i,
            vec![
                Value::Int64(i as i64),
                Value::Float64(100.0 + (i as f64) * 0.1),
                Value::String(sectors[(i as usize) % sectors.len()].into()),
            ],
        );
        store.insert(row).unwrap();
    }
}

/// Benchmark: resuming near the end of an index vs skipping from the start
fn index_seek_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_seek");

    for total_rows in [1_000u64, 10_000, 100_000].iter() {
        let mut store = RowStore::new(create_test_schema_with_indices()).unwrap();
        populate_store(&mut store, *total_rows);
        let anchor_id = total_rows - 10;
        let anchor_key = Value::Int64(anchor_id as i64);

        group.bench_with_input(
            BenchmarkId::new("seek_after", total_rows),
            &store,
            |b, store| {
                b.iter(|| {
                    let seek = IndexSeek {
                        key: &anchor_key,
                        identity: anchor_id,
                        mode: SeekMode::After,
                    };
                    let rows = store
                        .index_scan("idx_seq", &KeyRange::all(), ScanDirection::Forward, Some(seek))
                        .unwrap();
                    black_box(rows)
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("scan_and_skip", total_rows),
            &store,
            |b, store| {
                b.iter(|| {
                    let rows: Vec<_> = store
                        .index_scan("idx_seq", &KeyRange::all(), ScanDirection::Forward, None)
                        .unwrap()
                        .into_iter()
                        .skip_while(|(_, row)| row.id() <= anchor_id)
                        .collect();
                    black_box(rows)
                })
            },
        );
    }

    group.finish();
}

/// Benchmark: storage-order resume by identity
fn identity_seek_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity_seek");

    for total_rows in [10_000u64, 100_000].iter() {
        let mut store = RowStore::new(create_test_schema_with_indices()).unwrap();
        populate_store(&mut store, *total_rows);

        group.bench_with_input(
            BenchmarkId::new("scan_from", total_rows),
            &store,
            |b, store| b.iter(|| black_box(store.scan_from(total_rows / 2, SeekMode::After))),
        );
    }

    group.finish();
}

criterion_group!(benches, index_seek_benchmark, identity_seek_benchmark);

criterion_main!(benches);

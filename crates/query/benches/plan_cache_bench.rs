//! Benchmarks for the plan cache hot path and offset key resumption.
//!
//! Setup (store population, first compile) runs outside the measured
//! closures; only the cache lookup, key capture and resume are timed.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resumedb_core::schema::TableBuilder;
use resumedb_core::{DataType, Value};
use resumedb_query::ast::Expr;
use resumedb_query::planner::{IndexRange, ProjectedColumn, ResultTypeBinding};
use resumedb_query::{
    offset_key, CompileError, CompiledQuery, EngineConfig, ExecutionEnumerator, PlanNode, QueryEngine,
    QueryRequest, ResultType,
};
use resumedb_storage::{MemoryStore, ScanDirection};
use std::sync::Arc;

fn compile(_query: &str) -> Result<CompiledQuery, CompileError> {
    Ok(CompiledQuery::from_plan(
        PlanNode::index_scan("Account", "idx_accountid", IndexRange::all(), ScanDirection::Forward)
            .fetch_offset(Some(50), None)
            .project(
                vec![Expr::identity("Account")],
                ResultTypeBinding::new(vec![ProjectedColumn::object("a", "Account")]),
            ),
    ))
}

fn populate(count: i64) -> MemoryStore {
    let store = MemoryStore::new();
    store
        .create_table(
            TableBuilder::new("Account")
                .unwrap()
                .add_column("accountid", DataType::Int64)
                .unwrap()
                .add_index("idx_accountid", "accountid", true)
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap();
    // shuffled so identity order differs from key order
    for i in 0..count {
        let n = (i * 7919) % count;
        store.insert("Account", vec![Value::Int64(n)]).unwrap();
    }
    store
}

fn account() -> ResultType {
    ResultType::Object("Account".into())
}

fn bench_cache_hit(c: &mut Criterion) {
    let engine = QueryEngine::new(EngineConfig::default().with_workers(4), Arc::new(compile));
    let text = "SELECT a FROM Account a ORDER BY accountid FETCH 50";
    for worker in 0..4 {
        engine.get_or_compile(text, &account(), worker).unwrap();
    }
    c.bench_function("plan_cache_hit", |b| {
        b.iter(|| black_box(engine.get_or_compile(black_box(text), &account(), 2).unwrap()))
    });
}

fn bench_capture_and_resume(c: &mut Criterion) {
    let mut group = c.benchmark_group("offset_key");
    for &rows in &[1_000i64, 100_000] {
        let store = populate(rows);
        let engine = QueryEngine::new(EngineConfig::default(), Arc::new(compile));
        let template = engine
            .get_or_compile("SELECT a FROM Account a ORDER BY accountid FETCH 50", &account(), 0)
            .unwrap();
        let mut enumerator = ExecutionEnumerator::bind(Arc::clone(&template), Box::new(store.begin())).unwrap();
        for _ in 0..25 {
            enumerator.advance().unwrap();
        }

        group.bench_with_input(BenchmarkId::new("capture", rows), &enumerator, |b, e| {
            b.iter(|| black_box(e.capture_offset_key()))
        });

        let key = enumerator.capture_offset_key().unwrap();
        group.bench_with_input(BenchmarkId::new("resume_first_row", rows), &key, |b, key| {
            b.iter(|| {
                let mut resumed =
                    offset_key::decode(key, Arc::clone(&template), Box::new(store.begin()), Vec::new()).unwrap();
                black_box(resumed.advance().unwrap())
            })
        });
    }
    group.finish();
}

fn bench_fetch_page(c: &mut Criterion) {
    let store = populate(10_000);
    let engine = QueryEngine::new(EngineConfig::default(), Arc::new(compile));
    let request = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 50", account());
    let key = engine
        .fetch_page(&request, Box::new(store.begin()))
        .unwrap()
        .offset_key
        .unwrap();
    let resumed = request.clone().resume_from(key);
    c.bench_function("fetch_page_resumed", |b| {
        b.iter(|| black_box(engine.fetch_page(&resumed, Box::new(store.begin())).unwrap()))
    });
}

criterion_group!(benches, bench_cache_hit, bench_capture_and_resume, bench_fetch_page);
criterion_main!(benches);

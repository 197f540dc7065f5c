//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use resumedb_core::schema::TableBuilder;
use resumedb_core::{DataType, RowId, Value};
use resumedb_query::ast::Expr;
use resumedb_query::planner::{IndexRange, ProjectedColumn, ResultTypeBinding};
use resumedb_query::{CompileError, CompiledQuery, Page, PlanNode, QueryCompiler, ResultType};
use resumedb_storage::{MemoryStore, ScanDirection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// An `Account` extent holding the given account ids, inserted in order.
pub fn account_store(accountids: &[i64]) -> (MemoryStore, Vec<RowId>) {
    let store = MemoryStore::new();
    store
        .create_table(
            TableBuilder::new("Account")
                .unwrap()
                .add_column("accountid", DataType::Int64)
                .unwrap()
                .add_column("owner", DataType::String)
                .unwrap()
                .add_index("idx_accountid", "accountid", true)
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap();
    let ids = accountids
        .iter()
        .map(|&n| {
            store
                .insert("Account", vec![Value::Int64(n), Value::from(format!("owner{}", n))])
                .unwrap()
        })
        .collect();
    (store, ids)
}

pub fn account() -> ResultType {
    ResultType::Object("Account".into())
}

fn clause(words: &[&str], name: &str) -> Result<Option<u64>, CompileError> {
    words
        .iter()
        .position(|w| *w == name)
        .map(|i| {
            words
                .get(i + 1)
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| CompileError::new(format!("{} needs a count", name)))
        })
        .transpose()
}

/// Compiles the handful of statements the tests use:
///
/// `SELECT a FROM Account a [ORDER BY accountid] [OFFSET n] [FETCH n]`
///
/// `ORDER BY accountid` becomes an index scan; otherwise a full scan.
pub fn compile(query: &str) -> Result<CompiledQuery, CompileError> {
    let lowered = query.to_ascii_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if !lowered.starts_with("select a from account a") {
        return Err(CompileError::new(format!("unsupported statement: {}", query)));
    }
    let scan = if lowered.contains("order by accountid") {
        PlanNode::index_scan("Account", "idx_accountid", IndexRange::all(), ScanDirection::Forward)
    } else {
        PlanNode::full_scan("Account")
    };
    let fetch = clause(&words, "fetch")?;
    let offset = clause(&words, "offset")?;
    let plan = if fetch.is_some() || offset.is_some() {
        scan.fetch_offset(fetch, offset)
    } else {
        scan
    };
    Ok(CompiledQuery::from_plan(plan.project(
        vec![Expr::identity("Account")],
        ResultTypeBinding::new(vec![ProjectedColumn::object("a", "Account")]),
    )))
}

pub fn compiler() -> Arc<dyn QueryCompiler> {
    Arc::new(compile)
}

/// Counts compiler invocations.
#[derive(Default)]
pub struct CountingCompiler {
    pub calls: AtomicUsize,
}

impl CountingCompiler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QueryCompiler for CountingCompiler {
    fn compile(&self, query: &str) -> Result<CompiledQuery, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // widen the race window
        std::thread::sleep(std::time::Duration::from_millis(5));
        compile(query)
    }
}

/// Maps the object identities of a page back to account ids.
pub fn accountids(page: &Page, ids: &[RowId], accountids: &[i64]) -> Vec<i64> {
    page.rows
        .iter()
        .map(|row| {
            let id = row.identity().expect("object row");
            let pos = ids.iter().position(|&i| i == id).expect("known identity");
            accountids[pos]
        })
        .collect()
}

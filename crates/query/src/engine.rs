//! Query engine facade.
//!
//! `QueryEngine` ties the compiler collaborator, the per-worker plan cache
//! and the executor together. A request names the worker it runs on; an
//! optional offset key resumes a previous page, possibly captured on a
//! different worker.

use crate::error::{EngineError, EngineResult, WorkerId};
use crate::executor::{ExecutionEnumerator, ResultRow, RowSource};
use crate::offset_key::{self, OffsetKey};
use crate::plan_cache::{CacheStats, PlanCache, SchemaChangeScope};
use crate::planner::{PlanTemplate, QueryCompiler, ResultType};
use resumedb_core::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Engine configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of workers, each with its own plan cache.
    pub workers: usize,
    /// Bound on cached plans per worker. `None` means unbounded.
    pub max_plans_per_worker: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_plans_per_worker: None,
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_max_plans_per_worker(mut self, max: usize) -> Self {
        self.max_plans_per_worker = Some(max);
        self
    }
}

/// One query invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRequest {
    pub text: String,
    pub result_type: ResultType,
    pub worker: WorkerId,
    pub params: Vec<Value>,
    pub offset_key: Option<OffsetKey>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>, result_type: ResultType) -> Self {
        Self {
            text: text.into(),
            result_type,
            worker: 0,
            params: Vec::new(),
            offset_key: None,
        }
    }

    pub fn on_worker(mut self, worker: WorkerId) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Resumes after the position `key` was captured at.
    pub fn resume_from(mut self, key: OffsetKey) -> Self {
        self.offset_key = Some(key);
        self
    }
}

/// The rows of one page plus the key for the next, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub rows: Vec<ResultRow>,
    pub offset_key: Option<OffsetKey>,
}

impl Page {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when there is nothing left to fetch.
    pub fn is_last(&self) -> bool {
        self.offset_key.is_none()
    }
}

pub struct QueryEngine {
    config: EngineConfig,
    compiler: Arc<dyn QueryCompiler>,
    cache: PlanCache,
}

impl QueryEngine {
    pub fn new(config: EngineConfig, compiler: Arc<dyn QueryCompiler>) -> Self {
        let workers = config.workers.max(1);
        info!(
            workers,
            max_plans_per_worker = ?config.max_plans_per_worker,
            "query engine started"
        );
        Self {
            config: EngineConfig { workers, ..config },
            compiler,
            cache: PlanCache::new(workers, config.max_plans_per_worker),
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn plan_cache(&self) -> &PlanCache {
        &self.cache
    }

    /// Returns the worker's compiled template for `text`, compiling it on
    /// first use.
    pub fn get_or_compile(
        &self,
        text: &str,
        result_type: &ResultType,
        worker: WorkerId,
    ) -> EngineResult<Arc<PlanTemplate>> {
        self.cache
            .get_or_compile(text, result_type, worker, self.compiler.as_ref())
    }

    /// Binds an enumerator for `request` on `source`, resuming from its
    /// offset key when present.
    pub fn execute(
        &self,
        request: &QueryRequest,
        source: Box<dyn RowSource>,
    ) -> EngineResult<ExecutionEnumerator> {
        let template = self.get_or_compile(&request.text, &request.result_type, request.worker)?;
        match &request.offset_key {
            Some(key) => {
                debug!(worker = request.worker, key_len = key.len(), "resuming query");
                offset_key::decode(key, template, source, request.params.clone())
            }
            None => ExecutionEnumerator::bind_with_params(template, source, request.params.clone()),
        }
    }

    /// Runs `request` to the end of its page. The enumerator is disposed
    /// before returning.
    pub fn fetch_page(&self, request: &QueryRequest, source: Box<dyn RowSource>) -> EngineResult<Page> {
        let mut enumerator = self.execute(request, source)?;
        let mut rows = Vec::new();
        let outcome = loop {
            match enumerator.advance() {
                Ok(true) => match enumerator.current_row() {
                    Ok(row) => rows.push(row.clone()),
                    Err(err) => break Err(err),
                },
                Ok(false) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        let offset_key = enumerator.capture_offset_key();
        enumerator.dispose();
        outcome?;
        debug!(
            worker = request.worker,
            rows = rows.len(),
            more = offset_key.is_some(),
            "page fetched"
        );
        Ok(Page { rows, offset_key })
    }

    /// Drops cached plans affected by a schema change on every worker.
    pub fn invalidate(&self, scope: &SchemaChangeScope) -> usize {
        self.cache.invalidate(scope)
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        self.cache.stats()
    }

    /// Checks that `worker` exists.
    pub fn check_worker(&self, worker: WorkerId) -> EngineResult<()> {
        self.cache.worker(worker).map(|_| ())
    }

    /// Drops every cached plan. Enumerators already bound keep their
    /// templates alive.
    pub fn shutdown(&self) {
        self.cache.clear();
        info!("query engine shut down");
    }
}

impl fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::error::CompileError;
    use crate::planner::{CompiledQuery, PlanNode, ProjectedColumn, ResultTypeBinding, SortKey};
    use resumedb_core::schema::TableBuilder;
    use resumedb_core::DataType;
    use resumedb_storage::MemoryStore;

    fn compiler() -> Arc<dyn QueryCompiler> {
        Arc::new(|query: &str| -> Result<CompiledQuery, CompileError> {
            let fetch = query
                .split_whitespace()
                .skip_while(|w| *w != "fetch")
                .nth(1)
                .map(|n| n.parse::<u64>().map_err(|_| CompileError::new("bad fetch")))
                .transpose()?;
            let plan = PlanNode::full_scan("Account")
                .sort(vec![SortKey::asc(Expr::column("Account", "accountid", 0))])
                .fetch_offset(fetch, None)
                .project(
                    vec![Expr::column("Account", "accountid", 0)],
                    ResultTypeBinding::new(vec![ProjectedColumn::value("accountid", DataType::Int64)]),
                );
            Ok(CompiledQuery::from_plan(plan))
        })
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_table(
                TableBuilder::new("Account")
                    .unwrap()
                    .add_column("accountid", DataType::Int64)
                    .unwrap()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        for n in [3, 0, 4, 1, 2] {
            store.insert("Account", vec![Value::Int64(n)]).unwrap();
        }
        store
    }

    fn ids(page: &Page) -> Vec<Value> {
        page.rows.iter().map(|r| r.values()[0].clone()).collect()
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::default().with_workers(0).with_max_plans_per_worker(8);
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_plans_per_worker, Some(8));
    }

    #[test]
    fn test_pages_across_workers() {
        let store = store();
        let engine = QueryEngine::new(EngineConfig::default().with_workers(2), compiler());
        let scalar = ResultType::Scalar(DataType::Int64);

        let first = QueryRequest::new("select accountid from account order by accountid fetch 2", scalar.clone());
        let page = engine.fetch_page(&first, Box::new(store.begin())).unwrap();
        assert_eq!(ids(&page), vec![Value::Int64(0), Value::Int64(1)]);
        let key = page.offset_key.clone().unwrap();

        let next = first.clone().on_worker(1).resume_from(key);
        let page = engine.fetch_page(&next, Box::new(store.begin())).unwrap();
        assert_eq!(ids(&page), vec![Value::Int64(2), Value::Int64(3)]);

        let last = first.on_worker(0).resume_from(page.offset_key.unwrap());
        let page = engine.fetch_page(&last, Box::new(store.begin())).unwrap();
        assert_eq!(ids(&page), vec![Value::Int64(4)]);
        assert!(page.is_last());

        let stats = engine.stats();
        assert_eq!(stats[0].compiles, 1);
        assert_eq!(stats[0].hits, 1);
        assert_eq!(stats[1].compiles, 1);
    }

    #[test]
    fn test_unknown_worker_and_mismatch() {
        let engine = QueryEngine::new(EngineConfig::default(), compiler());
        let request = QueryRequest::new("select accountid from account", ResultType::Rows).on_worker(3);
        assert!(matches!(
            engine.fetch_page(&request, Box::new(store().begin())),
            Err(EngineError::UnknownWorker { worker: 3, workers: 1 })
        ));
        assert!(engine.check_worker(0).is_ok());

        let request = QueryRequest::new("select accountid from account", ResultType::Object("Account".into()));
        assert!(matches!(
            engine.execute(&request, Box::new(store().begin())),
            Err(EngineError::ResultTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_shutdown_clears_cache() {
        let engine = QueryEngine::new(EngineConfig::default(), compiler());
        engine.get_or_compile("select 1", &ResultType::Rows, 0).unwrap();
        assert_eq!(engine.stats()[0].entries, 1);
        engine.shutdown();
        assert_eq!(engine.stats()[0].entries, 0);
    }
}

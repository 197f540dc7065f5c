//! resumedb query - resumable query execution for the resumedb object store.
//!
//! This crate provides:
//!
//! - `ast`: Expression AST carried by plan nodes
//! - `planner`: Physical plan nodes, shape fingerprints and compiled templates
//! - `executor`: Cursors and the `ExecutionEnumerator` driving them
//! - `offset_key`: Serialized enumeration positions used to resume a query
//! - `plan_cache`: Per-worker compiled plan cache
//! - `engine`: The `QueryEngine` facade tying the pieces together
//!
//! # Example
//!
//! ```ignore
//! let engine = QueryEngine::new(EngineConfig::default().with_workers(4), compiler);
//! let request = QueryRequest::new("SELECT a FROM Account a ORDER BY a.accountid FETCH 3", ResultType::Rows);
//! let page = engine.fetch_page(&request, Box::new(store.begin()))?;
//! if let Some(key) = page.offset_key {
//!     let next = request.on_worker(2).resume_from(key);
//!     let page = engine.fetch_page(&next, Box::new(store.begin()))?;
//! }
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod executor;
pub mod offset_key;
pub mod plan_cache;
pub mod planner;

pub use engine::{EngineConfig, Page, QueryEngine, QueryRequest};
pub use error::{CompileError, EngineError, EngineResult, OffsetKeyError, SourceError, WorkerId};
pub use executor::{ExecutionEnumerator, ResultRow, RowSource};
pub use offset_key::OffsetKey;
pub use plan_cache::{CacheStats, PlanCache, SchemaChangeScope, WorkerCache};
pub use planner::{CompiledQuery, PlanNode, PlanTemplate, QueryCompiler, ResultType, ShapeFingerprint};

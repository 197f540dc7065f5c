//! Execution: cursors over plan trees and the enumerator driving them.

mod aggregate;
mod cursor;
mod enumerator;
mod eval;
mod join;
mod limit;
mod lookup;
mod project;
mod row;
mod scan;
mod sort;
mod source;

pub use enumerator::ExecutionEnumerator;
pub use eval::{eval_expr, eval_predicate, ExecContext};
pub use row::{ExtentSlot, ResultRow, RowLayout};
pub use source::{RowSource, SourceResult};

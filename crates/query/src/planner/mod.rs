//! Plan model: nodes, shape fingerprints, result type bindings and
//! compiled templates.

mod binding;
mod fingerprint;
mod plan;
mod template;

pub use binding::{ColumnKind, ProjectedColumn, ResultType, ResultTypeBinding};
pub use fingerprint::ShapeFingerprint;
pub use plan::{Aggregate, IndexRange, JoinKind, NodeKind, PlanNode, RangeBound, SortKey};
pub use template::{CompiledQuery, PlanTemplate, QueryCompiler};

//! Expression AST carried by plan nodes.

mod expr;

pub use expr::{AggregateFunc, BinaryOp, ColumnRef, Expr, SortOrder, UnaryOp};

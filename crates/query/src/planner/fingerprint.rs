//! Plan shape fingerprints.
//!
//! The fingerprint hashes the node kind sequence, the extents and the
//! indexes of a plan in pre-order, plus whatever decides the order a
//! resumed node seeks in: scan direction, join kind, and the column
//! structure of sort and group keys. Literal values, parameters, filters
//! and FETCH/OFFSET counts do not contribute, so two compilations that
//! differ only there are interchangeable for resumption.

use super::plan::{JoinKind, PlanNode};
use crate::ast::{Expr, SortOrder};
use resumedb_storage::ScanDirection;
use std::fmt;

/// FNV-1a offset basis.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime.
const FNV_PRIME: u64 = 0x100000001b3;

/// Structural identity of a plan tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeFingerprint(pub u64);

impl ShapeFingerprint {
    /// Computes the fingerprint of a plan tree.
    pub fn of(plan: &PlanNode) -> Self {
        let mut hasher = FnvHasher::new();
        for node in plan.preorder() {
            hasher.write_u8(node.kind().tag());
            match node {
                PlanNode::FullTableScan { extent, .. }
                | PlanNode::ObjectIdentityLookup { extent, .. }
                | PlanNode::ReferenceLookup { extent, .. } => hasher.write_str(extent),
                PlanNode::IndexScan {
                    extent,
                    index,
                    direction,
                    ..
                } => {
                    hasher.write_str(extent);
                    hasher.write_str(index);
                    // a key captured walking forward is meaningless walking back
                    hasher.write_u8(match direction {
                        ScanDirection::Forward => 0,
                        ScanDirection::Backward => 1,
                    });
                }
                PlanNode::Join { kind, .. } => hasher.write_u8(match kind {
                    JoinKind::Inner => 0,
                    JoinKind::LeftOuter => 1,
                }),
                PlanNode::Sort { keys, .. } => {
                    hasher.write_len(keys.len());
                    for key in keys {
                        hasher.write_expr(&key.expr);
                        hasher.write_u8(match key.order {
                            SortOrder::Asc => 0,
                            SortOrder::Desc => 1,
                        });
                    }
                }
                PlanNode::AggregateGroup { group_keys, .. } => {
                    hasher.write_len(group_keys.len());
                    for key in group_keys {
                        hasher.write_expr(key);
                    }
                }
                _ => {}
            }
        }
        ShapeFingerprint(hasher.finish())
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ShapeFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    fn new() -> Self {
        Self { state: FNV_OFFSET }
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= *byte as u64;
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_u8(&mut self, byte: u8) {
        self.write(&[byte]);
    }

    fn write_len(&mut self, len: usize) {
        self.write(&(len as u64).to_le_bytes());
    }

    /// Length-prefixed, so ("ab", "c") and ("a", "bc") differ.
    fn write_str(&mut self, s: &str) {
        self.write_len(s.len());
        self.write(s.as_bytes());
    }

    /// Hashes the structure of an expression and the columns it reads.
    /// Literal and parameter values are left out.
    fn write_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Column(col) => {
                self.write_u8(1);
                self.write_str(&col.table);
                self.write_str(&col.column);
                self.write_len(col.index);
            }
            Expr::Identity(table) => {
                self.write_u8(2);
                self.write_str(table);
            }
            Expr::Literal(_) => self.write_u8(3),
            Expr::Parameter(_) => self.write_u8(4),
            Expr::BinaryOp { left, op, right } => {
                self.write_u8(5);
                self.write_u8(*op as u8);
                self.write_expr(left);
                self.write_expr(right);
            }
            Expr::UnaryOp { op, expr } => {
                self.write_u8(6);
                self.write_u8(*op as u8);
                self.write_expr(expr);
            }
            Expr::Between { expr, low, high } => {
                self.write_u8(7);
                self.write_expr(expr);
                self.write_expr(low);
                self.write_expr(high);
            }
            Expr::In { expr, list } => {
                self.write_u8(8);
                self.write_expr(expr);
                self.write_len(list.len());
                for item in list {
                    self.write_expr(item);
                }
            }
            Expr::Like { expr, .. } => {
                self.write_u8(9);
                self.write_expr(expr);
            }
        }
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

//! Cursor tree mirroring a plan tree.
//!
//! `NodeCursor` is a closed sum over the cursor kinds; every operation is a
//! `match`, so saving and restoring visit nodes in the same pre-order by
//! construction. Cursors never hold plan references: the plan node is
//! passed to `advance` alongside its cursor.

use super::aggregate::AggregateCursor;
use super::eval::ExecContext;
use super::join::JoinCursor;
use super::limit::FetchOffsetCursor;
use super::lookup::LookupCursor;
use super::project::ProjectionCursor;
use super::row::{ResultRow, RowLayout};
use super::scan::ScanCursor;
use super::sort::SortCursor;
use super::source::RowSource;
use crate::error::{EngineError, EngineResult};
use crate::offset_key::NodeState;
use crate::planner::PlanNode;
use std::sync::Arc;

/// How a cursor is positioned from a restored state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResumeMode {
    /// Ignore the state; start from the beginning.
    Fresh,
    /// Continue strictly after the last delivered row.
    Exclusive,
    /// Deliver the last delivered row again, then continue. Used for the
    /// left side of a join positioned under a left row.
    Inclusive,
}

#[derive(Clone, Debug)]
pub(crate) enum NodeCursor {
    Scan(ScanCursor),
    Lookup(LookupCursor),
    Join(Box<JoinCursor>),
    Sort(Box<SortCursor>),
    Aggregate(Box<AggregateCursor>),
    FetchOffset(Box<FetchOffsetCursor>),
    Projection(Box<ProjectionCursor>),
}

impl NodeCursor {
    /// Builds fresh cursors for `node` and its subtree.
    pub fn open(node: &PlanNode, source: &dyn RowSource) -> EngineResult<Self> {
        Ok(match node {
            PlanNode::FullTableScan { extent, .. } | PlanNode::IndexScan { extent, .. } => {
                let layout = RowLayout::extent(extent.as_str(), source.column_count(extent)?);
                NodeCursor::Scan(ScanCursor::new(node.kind(), Arc::new(layout)))
            }
            PlanNode::ObjectIdentityLookup { extent, .. } | PlanNode::ReferenceLookup { extent, .. } => {
                let layout = RowLayout::extent(extent.as_str(), source.column_count(extent)?);
                NodeCursor::Lookup(LookupCursor::new(node.kind(), Arc::new(layout)))
            }
            PlanNode::Join { left, right, .. } => NodeCursor::Join(Box::new(JoinCursor::new(
                Self::open(left, source)?,
                Self::open(right, source)?,
            ))),
            PlanNode::Sort { child, .. } => NodeCursor::Sort(Box::new(SortCursor::new(Self::open(child, source)?))),
            PlanNode::AggregateGroup {
                child,
                group_keys,
                aggregates,
            } => NodeCursor::Aggregate(Box::new(AggregateCursor::new(
                Self::open(child, source)?,
                group_keys.len() + aggregates.len(),
            ))),
            PlanNode::FetchOffset { child, .. } => {
                NodeCursor::FetchOffset(Box::new(FetchOffsetCursor::new(Self::open(child, source)?)))
            }
            PlanNode::Projection { child, outputs, .. } => NodeCursor::Projection(Box::new(ProjectionCursor::new(
                Self::open(child, source)?,
                outputs.len(),
            ))),
        })
    }

    pub fn layout(&self) -> &Arc<RowLayout> {
        match self {
            NodeCursor::Scan(c) => c.layout(),
            NodeCursor::Lookup(c) => c.layout(),
            NodeCursor::Join(c) => c.layout(),
            NodeCursor::Sort(c) => c.layout(),
            NodeCursor::Aggregate(c) => c.layout(),
            NodeCursor::FetchOffset(c) => c.layout(),
            NodeCursor::Projection(c) => c.layout(),
        }
    }

    /// Produces the next row of `node`, or `None` when the node is done.
    pub fn advance(
        &mut self,
        node: &PlanNode,
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Option<ResultRow>> {
        match (self, node) {
            (NodeCursor::Scan(c), PlanNode::FullTableScan { .. } | PlanNode::IndexScan { .. }) => {
                c.advance(node, ctx, outer)
            }
            (NodeCursor::Lookup(c), PlanNode::ObjectIdentityLookup { .. } | PlanNode::ReferenceLookup { .. }) => {
                c.advance(node, ctx, outer)
            }
            (
                NodeCursor::Join(c),
                PlanNode::Join {
                    left,
                    right,
                    kind,
                    predicate,
                },
            ) => c.advance(left, right, *kind, predicate.as_ref(), ctx, outer),
            (NodeCursor::Sort(c), PlanNode::Sort { child, keys }) => c.advance(child, keys, ctx, outer),
            (
                NodeCursor::Aggregate(c),
                PlanNode::AggregateGroup {
                    child,
                    group_keys,
                    aggregates,
                },
            ) => c.advance(child, group_keys, aggregates, ctx, outer),
            (NodeCursor::FetchOffset(c), PlanNode::FetchOffset { child, fetch, offset }) => {
                c.advance(child, *fetch, *offset, ctx, outer)
            }
            (NodeCursor::Projection(c), PlanNode::Projection { child, outputs, .. }) => {
                c.advance(child, outputs, ctx, outer)
            }
            _ => Err(EngineError::InvalidState),
        }
    }

    /// Returns the subtree to its freshly opened state.
    pub fn rewind(&mut self) {
        match self {
            NodeCursor::Scan(c) => c.rewind(),
            NodeCursor::Lookup(c) => c.rewind(),
            NodeCursor::Join(c) => c.rewind(),
            NodeCursor::Sort(c) => c.rewind(),
            NodeCursor::Aggregate(c) => c.rewind(),
            NodeCursor::FetchOffset(c) => c.rewind(),
            NodeCursor::Projection(c) => c.rewind(),
        }
    }

    /// Appends the state of every node in the subtree, in pre-order.
    pub fn save(&self, out: &mut Vec<NodeState>) {
        match self {
            NodeCursor::Scan(c) => c.save(out),
            NodeCursor::Lookup(c) => c.save(out),
            NodeCursor::Join(c) => c.save(out),
            NodeCursor::Sort(c) => c.save(out),
            NodeCursor::Aggregate(c) => c.save(out),
            NodeCursor::FetchOffset(c) => c.save(out),
            NodeCursor::Projection(c) => c.save(out),
        }
    }

    /// Consumes the states of the subtree, in pre-order, and positions the
    /// cursors according to `mode`.
    pub fn restore(&mut self, states: &mut impl Iterator<Item = NodeState>, mode: ResumeMode) -> EngineResult<()> {
        match self {
            NodeCursor::Scan(c) => {
                let state = states.next().ok_or(EngineError::InvalidState)?;
                c.restore(state, mode)
            }
            NodeCursor::Lookup(c) => {
                let state = states.next().ok_or(EngineError::InvalidState)?;
                c.restore(state, mode)
            }
            NodeCursor::Join(c) => c.restore(states, mode),
            NodeCursor::Sort(c) => c.restore(states, mode),
            NodeCursor::Aggregate(c) => c.restore(states, mode),
            NodeCursor::FetchOffset(c) => c.restore(states, mode),
            NodeCursor::Projection(c) => c.restore(states, mode),
        }
    }

    /// True when the outermost FETCH window ended delivery while rows
    /// remained.
    pub fn stopped_early(&self) -> bool {
        match self {
            NodeCursor::FetchOffset(c) => c.stopped_early(),
            NodeCursor::Projection(c) => c.child().stopped_early(),
            _ => false,
        }
    }

    /// Resets the delivered count of the outermost FETCH window.
    pub fn start_page(&mut self) {
        match self {
            NodeCursor::FetchOffset(c) => c.start_page(),
            NodeCursor::Projection(c) => c.child_mut().start_page(),
            _ => {}
        }
    }
}

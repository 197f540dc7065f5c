//! Projection cursor.

use super::cursor::{NodeCursor, ResumeMode};
use super::eval::{eval_expr, ExecContext};
use super::row::{ResultRow, RowLayout};
use crate::ast::Expr;
use crate::error::{EngineError, EngineResult};
use crate::offset_key::NodeState;
use crate::planner::PlanNode;
use std::sync::Arc;

/// Evaluates the output expressions over each child row. Identities of
/// the child row pass through so ordering ties stay resolvable above.
#[derive(Clone, Debug)]
pub(crate) struct ProjectionCursor {
    child: NodeCursor,
    layout: Arc<RowLayout>,
}

impl ProjectionCursor {
    pub fn new(child: NodeCursor, width: usize) -> Self {
        let identities = child.layout().identity_count();
        Self {
            child,
            layout: Arc::new(RowLayout::anonymous(width, identities)),
        }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    #[inline]
    pub fn child(&self) -> &NodeCursor {
        &self.child
    }

    #[inline]
    pub fn child_mut(&mut self) -> &mut NodeCursor {
        &mut self.child
    }

    pub fn advance(
        &mut self,
        child_node: &PlanNode,
        outputs: &[Expr],
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Option<ResultRow>> {
        let Some(row) = self.child.advance(child_node, ctx, outer)? else {
            return Ok(None);
        };
        let values = outputs.iter().map(|e| eval_expr(e, &row, outer, ctx)).collect();
        Ok(Some(ResultRow::new(
            values,
            row.identities().to_vec(),
            Arc::clone(&self.layout),
        )))
    }

    pub fn rewind(&mut self) {
        self.child.rewind();
    }

    pub fn save(&self, out: &mut Vec<NodeState>) {
        out.push(NodeState::Projection);
        self.child.save(out);
    }

    pub fn restore(&mut self, states: &mut impl Iterator<Item = NodeState>, mode: ResumeMode) -> EngineResult<()> {
        let Some(NodeState::Projection) = states.next() else {
            return Err(EngineError::InvalidState);
        };
        self.child.restore(states, mode)
    }
}

//! Single-row lookups by identity or by reference.

use super::cursor::ResumeMode;
use super::eval::{eval_expr, eval_predicate, ExecContext};
use super::row::{ResultRow, RowLayout};
use crate::error::{EngineError, EngineResult};
use crate::offset_key::{LookupState, NodeState};
use crate::planner::{NodeKind, PlanNode};
use resumedb_core::Value;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub(crate) struct LookupCursor {
    kind: NodeKind,
    layout: Arc<RowLayout>,
    done: bool,
}

impl LookupCursor {
    pub fn new(kind: NodeKind, layout: Arc<RowLayout>) -> Self {
        Self {
            kind,
            layout,
            done: false,
        }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    pub fn advance(
        &mut self,
        node: &PlanNode,
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Option<ResultRow>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let empty = ResultRow::empty();
        let (record, filter) = match node {
            PlanNode::ObjectIdentityLookup {
                extent,
                identity,
                filter,
            } => {
                let id = match eval_expr(identity, &empty, outer, ctx) {
                    Value::Reference(id) => Some(id),
                    Value::Int64(n) => u64::try_from(n).ok(),
                    _ => None,
                };
                let record = match id {
                    Some(id) => ctx
                        .source
                        .lookup_by_identity(id)?
                        .filter(|(owner, _)| owner == extent)
                        .map(|(_, row)| row),
                    None => None,
                };
                (record, filter)
            }
            PlanNode::ReferenceLookup {
                extent,
                reference,
                filter,
            } => {
                let value = eval_expr(reference, &empty, outer, ctx);
                (ctx.source.lookup_by_reference(extent, &value)?, filter)
            }
            _ => return Err(EngineError::InvalidState),
        };
        let Some(record) = record else {
            return Ok(None);
        };
        let row = ResultRow::from_record(&record, Arc::clone(&self.layout));
        match filter {
            Some(cond) if !eval_predicate(cond, &row, outer, ctx) => Ok(None),
            _ => Ok(Some(row)),
        }
    }

    pub fn rewind(&mut self) {
        self.done = false;
    }

    pub fn save(&self, out: &mut Vec<NodeState>) {
        let state = LookupState { done: self.done };
        out.push(match self.kind {
            NodeKind::ReferenceLookup => NodeState::ReferenceLookup(state),
            _ => NodeState::ObjectIdentityLookup(state),
        });
    }

    pub fn restore(&mut self, state: NodeState, mode: ResumeMode) -> EngineResult<()> {
        let state = match (self.kind, state) {
            (NodeKind::ObjectIdentityLookup, NodeState::ObjectIdentityLookup(s))
            | (NodeKind::ReferenceLookup, NodeState::ReferenceLookup(s)) => s,
            _ => return Err(EngineError::InvalidState),
        };
        // only an exclusive resume keeps the delivered row suppressed
        self.done = mode == ResumeMode::Exclusive && state.done;
        Ok(())
    }
}

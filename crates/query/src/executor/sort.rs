//! Materializing sort cursor.

use super::cursor::{NodeCursor, ResumeMode};
use super::eval::{eval_expr, ExecContext};
use super::row::{ResultRow, RowLayout};
use crate::ast::SortOrder;
use crate::error::{EngineError, EngineResult};
use crate::offset_key::{NodeState, SortPosition, SortState};
use crate::planner::{PlanNode, SortKey};
use resumedb_core::RowId;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct SortedRow {
    position: SortPosition,
    row: ResultRow,
}

/// Sorts the whole child output on first `advance`.
///
/// Rows are ordered by the sort keys, then by their identities, so every
/// row has a distinct position and a resumed sort can seek past the last
/// delivered one even though its child was re-read from scratch. Only rows
/// that carry no identity at all fall back to their values. An update to a
/// non-key column therefore never moves a row.
#[derive(Clone, Debug)]
pub(crate) struct SortCursor {
    child: NodeCursor,
    rows: Option<Arc<Vec<SortedRow>>>,
    next: usize,
    last: Option<SortPosition>,
    seek: Option<(SortPosition, ResumeMode)>,
}

impl SortCursor {
    pub fn new(child: NodeCursor) -> Self {
        Self {
            child,
            rows: None,
            next: 0,
            last: None,
            seek: None,
        }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RowLayout> {
        self.child.layout()
    }

    fn materialize(
        &mut self,
        child_node: &PlanNode,
        keys: &[SortKey],
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Arc<Vec<SortedRow>>> {
        let mut rows = Vec::new();
        while let Some(row) = self.child.advance(child_node, ctx, outer)? {
            let identities = row.identities().to_vec();
            let values = if has_identity(&identities) {
                Vec::new()
            } else {
                row.values().to_vec()
            };
            let position = SortPosition {
                keys: keys.iter().map(|k| eval_expr(&k.expr, &row, outer, ctx)).collect(),
                identities,
                values,
            };
            rows.push(SortedRow { position, row });
        }
        rows.sort_by(|a, b| compare_positions(&a.position, &b.position, keys));

        self.next = match self.seek.take() {
            Some((anchor, mode)) => rows.partition_point(|r| {
                let ord = compare_positions(&r.position, &anchor, keys);
                match mode {
                    ResumeMode::Inclusive => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                }
            }),
            None => 0,
        };
        Ok(Arc::new(rows))
    }

    pub fn advance(
        &mut self,
        child_node: &PlanNode,
        keys: &[SortKey],
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Option<ResultRow>> {
        let rows = match &self.rows {
            Some(rows) => Arc::clone(rows),
            None => {
                let rows = self.materialize(child_node, keys, ctx, outer)?;
                self.rows = Some(Arc::clone(&rows));
                rows
            }
        };
        let Some(sorted) = rows.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        self.last = Some(sorted.position.clone());
        Ok(Some(sorted.row.clone()))
    }

    pub fn rewind(&mut self) {
        self.child.rewind();
        self.rows = None;
        self.next = 0;
        self.last = None;
        self.seek = None;
    }

    pub fn save(&self, out: &mut Vec<NodeState>) {
        out.push(NodeState::Sort(SortState {
            last: self.last.clone(),
        }));
        self.child.save(out);
    }

    pub fn restore(&mut self, states: &mut impl Iterator<Item = NodeState>, mode: ResumeMode) -> EngineResult<()> {
        let Some(NodeState::Sort(state)) = states.next() else {
            return Err(EngineError::InvalidState);
        };
        self.rewind();
        // the child is always re-read in full
        self.child.restore(states, ResumeMode::Fresh)?;
        if mode != ResumeMode::Fresh {
            self.seek = state.last.clone().map(|pos| (pos, mode));
            if mode == ResumeMode::Exclusive {
                self.last = state.last;
            }
        }
        Ok(())
    }
}

fn compare_positions(a: &SortPosition, b: &SortPosition, keys: &[SortKey]) -> Ordering {
    for (i, key) in keys.iter().enumerate() {
        let cmp = match (a.keys.get(i), b.keys.get(i)) {
            (Some(av), Some(bv)) => av.cmp(bv),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if cmp != Ordering::Equal {
            return match key.order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            };
        }
    }
    let by_identity = a.identities.cmp(&b.identities);
    if by_identity != Ordering::Equal || has_identity(&a.identities) {
        return by_identity;
    }
    a.values.cmp(&b.values)
}

#[inline]
fn has_identity(identities: &[Option<RowId>]) -> bool {
    identities.iter().any(Option::is_some)
}

//! Nested-loop join cursor.

use super::cursor::{NodeCursor, ResumeMode};
use super::eval::{eval_predicate, ExecContext};
use super::row::{ResultRow, RowLayout};
use crate::ast::Expr;
use crate::error::{EngineError, EngineResult};
use crate::offset_key::{JoinState, NodeState};
use crate::planner::{JoinKind, PlanNode};
use resumedb_core::RowId;
use std::borrow::Cow;
use std::sync::Arc;

/// For each left row, every right row the predicate accepts. The right
/// side is re-opened per left row and sees the left row (joined onto the
/// enclosing outer row) as its outer row.
#[derive(Clone, Debug)]
pub(crate) struct JoinCursor {
    left: NodeCursor,
    right: NodeCursor,
    layout: Arc<RowLayout>,
    right_layout: Arc<RowLayout>,
    current_left: Option<ResultRow>,
    matched: bool,
    /// Set by `restore`: if the first left row fetched has these
    /// identities, the restored right side stays valid under it.
    resume_under: Option<(Vec<Option<RowId>>, bool)>,
}

impl JoinCursor {
    pub fn new(left: NodeCursor, right: NodeCursor) -> Self {
        let right_layout = Arc::clone(right.layout());
        let layout = Arc::new(left.layout().concat(&right_layout));
        Self {
            left,
            right,
            layout,
            right_layout,
            current_left: None,
            matched: false,
            resume_under: None,
        }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    pub fn advance(
        &mut self,
        left_node: &PlanNode,
        right_node: &PlanNode,
        kind: JoinKind,
        predicate: Option<&Expr>,
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Option<ResultRow>> {
        loop {
            if self.current_left.is_none() {
                let Some(left_row) = self.left.advance(left_node, ctx, outer)? else {
                    return Ok(None);
                };
                match self.resume_under.take() {
                    Some((ids, matched)) if ids.as_slice() == left_row.identities() => {
                        self.matched = matched;
                    }
                    _ => {
                        self.right.rewind();
                        self.matched = false;
                    }
                }
                self.current_left = Some(left_row);
            }

            let Some(left_row) = self.current_left.as_ref() else {
                return Err(EngineError::InvalidState);
            };
            let next = {
                let right_outer = correlate(outer, left_row);
                self.right.advance(right_node, ctx, Some(&right_outer))?
            };

            match next {
                Some(right_row) => {
                    let joined = left_row.join(&right_row, Arc::clone(&self.layout));
                    if let Some(cond) = predicate {
                        if !eval_predicate(cond, &joined, outer, ctx) {
                            continue;
                        }
                    }
                    self.matched = true;
                    return Ok(Some(joined));
                }
                None => {
                    let unmatched = kind == JoinKind::LeftOuter && !self.matched;
                    let left_row = self.current_left.take();
                    if let (true, Some(left_row)) = (unmatched, left_row) {
                        return Ok(Some(left_row.join_null(&self.right_layout, Arc::clone(&self.layout))));
                    }
                }
            }
        }
    }

    pub fn rewind(&mut self) {
        self.left.rewind();
        self.right.rewind();
        self.current_left = None;
        self.matched = false;
        self.resume_under = None;
    }

    pub fn save(&self, out: &mut Vec<NodeState>) {
        out.push(NodeState::Join(JoinState {
            left_row: self.current_left.as_ref().map(|row| row.identities().to_vec()),
            matched: self.matched,
        }));
        self.left.save(out);
        self.right.save(out);
    }

    pub fn restore(&mut self, states: &mut impl Iterator<Item = NodeState>, mode: ResumeMode) -> EngineResult<()> {
        let Some(NodeState::Join(state)) = states.next() else {
            return Err(EngineError::InvalidState);
        };
        self.rewind();
        match (mode, state.left_row) {
            (ResumeMode::Fresh, _) => {
                self.left.restore(states, ResumeMode::Fresh)?;
                self.right.restore(states, ResumeMode::Fresh)?;
            }
            // Positioned under a left row: fetch that row again, then carry
            // on inside the right side.
            (_, Some(ids)) => {
                self.left.restore(states, ResumeMode::Inclusive)?;
                self.right.restore(states, mode)?;
                self.resume_under = Some((ids, state.matched));
            }
            // The last left row was finished (a null-extended row was the
            // last delivered); the right side starts over.
            (_, None) => {
                self.left.restore(states, mode)?;
                self.right.restore(states, ResumeMode::Fresh)?;
            }
        }
        Ok(())
    }
}

/// Outer row seen by the right side.
fn correlate<'a>(outer: Option<&ResultRow>, left_row: &'a ResultRow) -> Cow<'a, ResultRow> {
    match outer {
        None => Cow::Borrowed(left_row),
        Some(outer) => {
            let layout = Arc::new(outer.layout().concat(left_row.layout()));
            Cow::Owned(outer.join(left_row, layout))
        }
    }
}

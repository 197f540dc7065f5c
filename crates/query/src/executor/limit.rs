//! FETCH / OFFSET window cursor.

use super::cursor::{NodeCursor, ResumeMode};
use super::eval::ExecContext;
use super::row::{ResultRow, RowLayout};
use crate::error::{EngineError, EngineResult};
use crate::offset_key::{NodeState, WindowState};
use crate::planner::PlanNode;
use std::sync::Arc;

/// Suppresses the first `offset` child rows, then delivers at most `fetch`
/// rows. Counts rows delivered, not rows scanned.
///
/// When the limit stops delivery, a copy of the child is advanced once to
/// learn whether rows remain; only then is the position worth capturing.
#[derive(Clone, Debug)]
pub(crate) struct FetchOffsetCursor {
    child: NodeCursor,
    skipped: u64,
    delivered: u64,
    looked_ahead: bool,
    cut_off: bool,
}

impl FetchOffsetCursor {
    pub fn new(child: NodeCursor) -> Self {
        Self {
            child,
            skipped: 0,
            delivered: 0,
            looked_ahead: false,
            cut_off: false,
        }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RowLayout> {
        self.child.layout()
    }

    pub fn advance(
        &mut self,
        child_node: &PlanNode,
        fetch: Option<u64>,
        offset: Option<u64>,
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Option<ResultRow>> {
        if fetch.is_some_and(|limit| self.delivered >= limit) {
            if !self.looked_ahead {
                self.looked_ahead = true;
                if self.delivered > 0 {
                    let mut ahead = self.child.clone();
                    self.cut_off = ahead.advance(child_node, ctx, outer)?.is_some();
                }
            }
            return Ok(None);
        }
        let offset = offset.unwrap_or(0);
        while let Some(row) = self.child.advance(child_node, ctx, outer)? {
            if self.skipped < offset {
                self.skipped += 1;
                continue;
            }
            self.delivered += 1;
            return Ok(Some(row));
        }
        Ok(None)
    }

    /// True when the window limit, not the input, ended delivery.
    #[inline]
    pub fn stopped_early(&self) -> bool {
        self.cut_off
    }

    /// Starts a new page: the FETCH limit counts from zero again while the
    /// OFFSET already consumed stays consumed.
    pub fn start_page(&mut self) {
        self.delivered = 0;
        self.looked_ahead = false;
        self.cut_off = false;
    }

    pub fn rewind(&mut self) {
        self.child.rewind();
        self.skipped = 0;
        self.start_page();
    }

    pub fn save(&self, out: &mut Vec<NodeState>) {
        out.push(NodeState::FetchOffset(WindowState {
            skipped: self.skipped,
            delivered: self.delivered,
        }));
        self.child.save(out);
    }

    pub fn restore(&mut self, states: &mut impl Iterator<Item = NodeState>, mode: ResumeMode) -> EngineResult<()> {
        let Some(NodeState::FetchOffset(state)) = states.next() else {
            return Err(EngineError::InvalidState);
        };
        self.rewind();
        self.child.restore(states, mode)?;
        match mode {
            ResumeMode::Fresh => {}
            ResumeMode::Exclusive => {
                self.skipped = state.skipped;
                self.delivered = state.delivered;
            }
            ResumeMode::Inclusive => {
                // the last delivered row comes again and is counted again
                self.skipped = state.skipped;
                self.delivered = state.delivered.saturating_sub(1);
            }
        }
        Ok(())
    }
}

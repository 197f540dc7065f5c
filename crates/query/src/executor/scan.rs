//! Full table and index scan cursor.

use super::cursor::ResumeMode;
use super::eval::{eval_predicate, ExecContext};
use super::row::{ResultRow, RowLayout};
use crate::error::{EngineError, EngineResult};
use crate::offset_key::{NodeState, ScanPosition, ScanState};
use crate::planner::{NodeKind, PlanNode};
use resumedb_core::{Row, Value};
use resumedb_storage::{IndexSeek, KeyRange, SeekMode};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Records fetched from the source per refill.
pub(crate) const SCAN_BATCH: usize = 64;

/// Cursor over one extent, in storage order or index key order.
///
/// The scan opens lazily on the first `advance`, so an index range that
/// depends on the enclosing join row is evaluated against the current one.
/// Records arrive in batches of `SCAN_BATCH`; each refill re-opens the scan
/// after the last record fetched. Its position is the key and identity of
/// the last row it delivered.
#[derive(Clone, Debug)]
pub(crate) struct ScanCursor {
    kind: NodeKind,
    layout: Arc<RowLayout>,
    buffer: VecDeque<(Option<Value>, Arc<Row>)>,
    /// Index range evaluated at open.
    range: Option<KeyRange<Value>>,
    opened: bool,
    /// The source has nothing beyond the buffer.
    drained: bool,
    exhausted: bool,
    last: Option<ScanPosition>,
    /// Position of the last record fetched, delivered or not.
    tail: Option<ScanPosition>,
    /// Anchor the next open starts from.
    seek: Option<(ScanPosition, SeekMode)>,
}

impl ScanCursor {
    pub fn new(kind: NodeKind, layout: Arc<RowLayout>) -> Self {
        Self {
            kind,
            layout,
            buffer: VecDeque::new(),
            range: None,
            opened: false,
            drained: false,
            exhausted: false,
            last: None,
            tail: None,
            seek: None,
        }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    fn open(&mut self, node: &PlanNode, ctx: &ExecContext<'_>, outer: Option<&ResultRow>) -> EngineResult<()> {
        self.opened = true;
        if let PlanNode::IndexScan { range, .. } = node {
            self.range = range.evaluate(ctx, outer);
            if self.range.is_none() {
                // NULL bound: nothing can match
                self.drained = true;
                return Ok(());
            }
        }
        let seek = self.seek.take();
        self.fill(node, ctx, seek.as_ref())?;
        if let Some((pos, mode)) = &seek {
            trace!(
                kind = self.kind.name(),
                identity = pos.identity,
                ?mode,
                buffered = self.buffer.len(),
                "scan re-opened from position"
            );
        }
        Ok(())
    }

    /// Fetches the next batch, starting from `from` or from the beginning.
    fn fill(
        &mut self,
        node: &PlanNode,
        ctx: &ExecContext<'_>,
        from: Option<&(ScanPosition, SeekMode)>,
    ) -> EngineResult<()> {
        let batch: Vec<(Option<Value>, Arc<Row>)> = match node {
            PlanNode::FullTableScan { extent, .. } => ctx
                .source
                .scan_extent_with_limit(extent, from.map(|(pos, mode)| (pos.identity, *mode)), Some(SCAN_BATCH))?
                .into_iter()
                .map(|row| (None, row))
                .collect(),
            PlanNode::IndexScan {
                extent,
                index,
                direction,
                ..
            } => {
                let range = self.range.as_ref().ok_or(EngineError::InvalidState)?;
                let seek = match from {
                    Some((ScanPosition { key: Some(key), identity }, mode)) => Some(IndexSeek {
                        key,
                        identity: *identity,
                        mode: *mode,
                    }),
                    Some((ScanPosition { key: None, .. }, _)) => return Err(EngineError::InvalidState),
                    None => None,
                };
                ctx.source
                    .scan_index_with_limit(extent, index, range, *direction, seek, Some(SCAN_BATCH))?
                    .into_iter()
                    .map(|(key, row)| (Some(key), row))
                    .collect()
            }
            _ => return Err(EngineError::InvalidState),
        };
        self.drained = batch.len() < SCAN_BATCH;
        if let Some((key, record)) = batch.last() {
            self.tail = Some(ScanPosition {
                key: key.clone(),
                identity: record.id(),
            });
        }
        self.buffer.extend(batch);
        Ok(())
    }

    pub fn advance(
        &mut self,
        node: &PlanNode,
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Option<ResultRow>> {
        if self.exhausted {
            return Ok(None);
        }
        if !self.opened {
            self.open(node, ctx, outer)?;
        }
        let filter = match node {
            PlanNode::FullTableScan { filter, .. } | PlanNode::IndexScan { filter, .. } => filter.as_ref(),
            _ => return Err(EngineError::InvalidState),
        };
        loop {
            let Some((key, record)) = self.buffer.pop_front() else {
                if self.drained {
                    break;
                }
                let from = self.tail.clone().map(|pos| (pos, SeekMode::After));
                self.fill(node, ctx, from.as_ref())?;
                continue;
            };
            let row = ResultRow::from_record(&record, Arc::clone(&self.layout));
            if let Some(cond) = filter {
                if !eval_predicate(cond, &row, outer, ctx) {
                    continue;
                }
            }
            self.last = Some(ScanPosition {
                key,
                identity: record.id(),
            });
            return Ok(Some(row));
        }
        self.exhausted = true;
        Ok(None)
    }

    pub fn rewind(&mut self) {
        self.buffer.clear();
        self.range = None;
        self.opened = false;
        self.drained = false;
        self.exhausted = false;
        self.last = None;
        self.tail = None;
        self.seek = None;
    }

    pub fn save(&self, out: &mut Vec<NodeState>) {
        let state = ScanState {
            exhausted: self.exhausted,
            last: self.last.clone(),
        };
        out.push(match self.kind {
            NodeKind::IndexScan => NodeState::IndexScan(state),
            _ => NodeState::FullTableScan(state),
        });
    }

    pub fn restore(&mut self, state: NodeState, mode: ResumeMode) -> EngineResult<()> {
        let state = match (self.kind, state) {
            (NodeKind::FullTableScan, NodeState::FullTableScan(s)) | (NodeKind::IndexScan, NodeState::IndexScan(s)) => s,
            _ => return Err(EngineError::InvalidState),
        };
        self.rewind();
        match mode {
            ResumeMode::Fresh => {}
            ResumeMode::Exclusive => {
                self.exhausted = state.exhausted;
                self.seek = state.last.clone().map(|pos| (pos, SeekMode::After));
                self.last = state.last;
            }
            ResumeMode::Inclusive => {
                self.seek = state.last.map(|pos| (pos, SeekMode::AtOrAfter));
            }
        }
        Ok(())
    }
}

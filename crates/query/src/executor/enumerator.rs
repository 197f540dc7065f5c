//! The execution enumerator.

use super::cursor::{NodeCursor, ResumeMode};
use super::eval::ExecContext;
use super::row::ResultRow;
use super::source::RowSource;
use crate::error::{EngineError, EngineResult};
use crate::offset_key::{self, NodeState, OffsetKey};
use crate::planner::{PlanTemplate, ShapeFingerprint};
use resumedb_core::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    NotStarted,
    OnRow,
    /// `resumable` is set when a FETCH limit, not the data, ended the
    /// enumeration.
    Exhausted {
        resumable: bool,
    },
}

/// Runtime iterator over a compiled plan, bound to one transaction.
///
/// Not thread-safe: one owner drives it. The offset key it captures is the
/// only thing meant to travel to another worker.
pub struct ExecutionEnumerator {
    template: Arc<PlanTemplate>,
    source: Option<Box<dyn RowSource>>,
    params: Vec<Value>,
    root: NodeCursor,
    current: Option<ResultRow>,
    phase: Phase,
    delivered: u64,
    disposed: bool,
}

impl ExecutionEnumerator {
    /// Binds fresh cursors for `template` to `source`.
    pub fn bind(template: Arc<PlanTemplate>, source: Box<dyn RowSource>) -> EngineResult<Self> {
        Self::bind_with_params(template, source, Vec::new())
    }

    /// Like `bind`, with positional parameter values.
    pub fn bind_with_params(
        template: Arc<PlanTemplate>,
        source: Box<dyn RowSource>,
        params: Vec<Value>,
    ) -> EngineResult<Self> {
        if !source.is_active() {
            return Err(EngineError::TransactionEnded);
        }
        let root = NodeCursor::open(template.plan(), source.as_ref())?;
        Ok(Self {
            template,
            source: Some(source),
            params,
            root,
            current: None,
            phase: Phase::NotStarted,
            delivered: 0,
            disposed: false,
        })
    }

    /// Binds and positions the cursors from decoded node states. The outermost
    /// FETCH window starts a new page.
    pub(crate) fn resume(
        template: Arc<PlanTemplate>,
        source: Box<dyn RowSource>,
        params: Vec<Value>,
        states: Vec<NodeState>,
    ) -> EngineResult<Self> {
        let mut enumerator = Self::bind_with_params(template, source, params)?;
        let mut states = states.into_iter();
        enumerator.root.restore(&mut states, ResumeMode::Exclusive)?;
        if states.next().is_some() {
            return Err(EngineError::InvalidState);
        }
        enumerator.root.start_page();
        debug!(
            plan = %enumerator.template.fingerprint(),
            query = enumerator.template.query(),
            "enumerator resumed from offset key"
        );
        Ok(enumerator)
    }

    fn check_source(&self) -> EngineResult<&dyn RowSource> {
        let source = self.source.as_deref().ok_or(EngineError::InvalidState)?;
        if !source.is_active() {
            return Err(EngineError::TransactionEnded);
        }
        Ok(source)
    }

    /// Moves to the next row. Returns `false` once the enumeration is over;
    /// calling it again after that (or after `dispose`) is an error.
    pub fn advance(&mut self) -> EngineResult<bool> {
        if self.disposed || matches!(self.phase, Phase::Exhausted { .. }) {
            return Err(EngineError::InvalidState);
        }
        let source = self.source.as_deref().ok_or(EngineError::InvalidState)?;
        if !source.is_active() {
            return Err(EngineError::TransactionEnded);
        }
        let ctx = ExecContext::new(source, &self.params);
        match self.root.advance(self.template.plan(), &ctx, None) {
            Ok(Some(row)) => {
                self.current = Some(row);
                self.phase = Phase::OnRow;
                self.delivered += 1;
                Ok(true)
            }
            Ok(None) => {
                self.current = None;
                self.phase = Phase::Exhausted {
                    resumable: self.root.stopped_early(),
                };
                Ok(false)
            }
            Err(err) => {
                self.current = None;
                self.phase = Phase::Exhausted { resumable: false };
                Err(err)
            }
        }
    }

    /// The row the last successful `advance` moved to.
    pub fn current_row(&self) -> EngineResult<&ResultRow> {
        if self.disposed {
            return Err(EngineError::InvalidCursorState);
        }
        let row = match (self.phase, &self.current) {
            (Phase::OnRow, Some(row)) => row,
            _ => return Err(EngineError::InvalidCursorState),
        };
        self.check_source()?;
        Ok(row)
    }

    /// Serializes the current position. `None` before the first row and
    /// once the data (not a FETCH limit) is exhausted. Works after the
    /// transaction ended and after `dispose`.
    pub fn capture_offset_key(&self) -> Option<OffsetKey> {
        if self.delivered == 0 {
            return None;
        }
        match self.phase {
            Phase::OnRow | Phase::Exhausted { resumable: true } => {
                let mut states = Vec::with_capacity(self.template.node_count());
                self.root.save(&mut states);
                Some(offset_key::encode_states(self.template.fingerprint(), &states))
            }
            Phase::NotStarted | Phase::Exhausted { resumable: false } => None,
        }
    }

    /// Returns to the freshly bound state on the same transaction.
    pub fn reset(&mut self) -> EngineResult<()> {
        if self.disposed {
            return Err(EngineError::InvalidState);
        }
        self.check_source()?;
        self.root.rewind();
        self.current = None;
        self.phase = Phase::NotStarted;
        self.delivered = 0;
        Ok(())
    }

    /// Releases the transaction handle. Idempotent.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.source = None;
            self.current = None;
        }
    }

    #[inline]
    pub fn template(&self) -> &Arc<PlanTemplate> {
        &self.template
    }

    #[inline]
    pub fn fingerprint(&self) -> ShapeFingerprint {
        self.template.fingerprint()
    }

    /// Rows delivered since bind, resume or reset.
    #[inline]
    pub fn rows_delivered(&self) -> u64 {
        self.delivered
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.phase, Phase::Exhausted { .. })
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl fmt::Debug for ExecutionEnumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEnumerator")
            .field("fingerprint", &self.template.fingerprint())
            .field("phase", &self.phase)
            .field("delivered", &self.delivered)
            .field("disposed", &self.disposed)
            .finish()
    }
}

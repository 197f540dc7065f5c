//! Read transactions.
//!
//! A `Snapshot` pins one committed `StoreState`. Clones share the same
//! transaction: ending any clone ends all of them, which is how a query
//! layer holding a clone learns that its transaction is gone.

use crate::key_range::KeyRange;
use crate::row_store::{IndexSeek, RowStore, ScanDirection, SeekMode};
use crate::store::StoreState;
use resumedb_core::{Result, Row, RowId, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Global transaction ID counter.
static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID type.
pub type TransactionId = u64;

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Reads are allowed.
    Active,
    /// The transaction was ended; its snapshot must not be read again.
    Ended,
}

/// A read transaction over one version of the store.
#[derive(Clone, Debug)]
pub struct Snapshot {
    id: TransactionId,
    state: Arc<StoreState>,
    ended: Arc<AtomicBool>,
}

impl Snapshot {
    pub(crate) fn new(state: Arc<StoreState>) -> Self {
        let id = NEXT_TX_ID.fetch_add(1, Ordering::SeqCst);
        trace!(tx = id, version = state.version(), "snapshot opened");
        Self {
            id,
            state,
            ended: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn transaction_state(&self) -> TransactionState {
        if self.ended.load(Ordering::Acquire) {
            TransactionState::Ended
        } else {
            TransactionState::Active
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.transaction_state() == TransactionState::Active
    }

    /// Ends the transaction for every clone of this snapshot. Idempotent.
    pub fn end(&self) {
        if !self.ended.swap(true, Ordering::AcqRel) {
            trace!(tx = self.id, "snapshot ended");
        }
    }

    /// Returns the pinned store state.
    #[inline]
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Gets an extent of the pinned state.
    pub fn table(&self, name: &str) -> Result<&RowStore> {
        self.state.table(name)
    }

    /// Records of an extent in storage order, optionally after an identity.
    pub fn scan(&self, table: &str, after: Option<(RowId, SeekMode)>) -> Result<Vec<Arc<Row>>> {
        self.scan_with_limit(table, after, None)
    }

    /// Like `scan`, returning at most `limit` records.
    pub fn scan_with_limit(
        &self,
        table: &str,
        after: Option<(RowId, SeekMode)>,
        limit: Option<usize>,
    ) -> Result<Vec<Arc<Row>>> {
        Ok(self.table(table)?.scan_with_limit(after, limit))
    }

    /// Index entries of an extent within `range`.
    pub fn index_scan(
        &self,
        table: &str,
        index: &str,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: Option<IndexSeek<'_>>,
    ) -> Result<Vec<(Value, Arc<Row>)>> {
        self.index_scan_with_limit(table, index, range, direction, seek, None)
    }

    /// Like `index_scan`, returning at most `limit` entries.
    pub fn index_scan_with_limit(
        &self,
        table: &str,
        index: &str,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: Option<IndexSeek<'_>>,
        limit: Option<usize>,
    ) -> Result<Vec<(Value, Arc<Row>)>> {
        self.table(table)?.index_scan_with_limit(index, range, direction, seek, limit)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::MemoryStore;
    use resumedb_core::schema::TableBuilder;
    use resumedb_core::{DataType, Value};

    #[test]
    fn test_snapshot_ids_increase() {
        let store = MemoryStore::new();
        let a = store.begin();
        let b = store.begin();
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_end_is_shared_by_clones() {
        let store = MemoryStore::new();
        let snapshot = store.begin();
        let held = snapshot.clone();
        assert!(held.is_active());
        snapshot.end();
        snapshot.end();
        assert!(!held.is_active());
    }

    #[test]
    fn test_scan_through_snapshot() {
        let store = MemoryStore::new();
        store
            .create_table(
                TableBuilder::new("Item")
                    .unwrap()
                    .add_column("n", DataType::Int32)
                    .unwrap()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let first = store.insert("Item", vec![Value::Int32(1)]).unwrap();
        store.insert("Item", vec![Value::Int32(2)]).unwrap();
        let snapshot = store.begin();
        assert_eq!(snapshot.scan("Item", None).unwrap().len(), 2);
        let rest = snapshot
            .scan("Item", Some((first, super::SeekMode::After)))
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert!(snapshot.scan("Missing", None).is_err());
    }
}

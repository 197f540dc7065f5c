//! Stored records.
//!
//! A `Row` is addressed by its object identity, a `RowId` drawn from one
//! process-wide counter so identities never repeat across extents.

use crate::value::Value;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

/// Object identity of a stored record.
pub type RowId = u64;

static NEXT_ROW_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates the next object identity.
pub fn next_row_id() -> RowId {
    NEXT_ROW_ID.fetch_add(1, Ordering::SeqCst)
}

/// A record in an extent.
#[derive(Clone, Debug)]
pub struct Row {
    id: RowId,
    /// Bumped on every update of the record.
    version: u64,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row with the given identity and values at version 1.
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, version: 1, values }
    }

    /// Returns the object identity.
    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replaces the values and bumps the version.
    pub fn replace_values(&mut self, values: Vec<Value>) -> u64 {
        self.values = values;
        self.version = self.version.wrapping_add(1);
        self.version
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Gets a value at the given column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.values == other.values
    }
}

//! Rows flowing between cursors.

use resumedb_core::{Row, RowId, Value};
use std::sync::Arc;

/// Placement of one extent's columns inside a (possibly joined) row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtentSlot {
    pub name: String,
    /// First value position of the extent.
    pub offset: usize,
    pub width: usize,
    /// Position of the extent's object identity in `ResultRow::identities`.
    pub identity: usize,
}

/// Column layout of the rows a cursor yields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowLayout {
    slots: Vec<ExtentSlot>,
    width: usize,
    identities: usize,
}

impl RowLayout {
    /// Layout of a single extent record.
    pub fn extent(name: impl Into<String>, width: usize) -> Self {
        Self {
            slots: vec![ExtentSlot {
                name: name.into(),
                offset: 0,
                width,
                identity: 0,
            }],
            width,
            identities: 1,
        }
    }

    /// Layout without extent slots (projections and aggregates).
    pub fn anonymous(width: usize, identities: usize) -> Self {
        Self {
            slots: Vec::new(),
            width,
            identities,
        }
    }

    /// Layout of `self` followed by `right`.
    pub fn concat(&self, right: &RowLayout) -> Self {
        let mut slots = self.slots.clone();
        slots.extend(right.slots.iter().map(|s| ExtentSlot {
            name: s.name.clone(),
            offset: s.offset + self.width,
            width: s.width,
            identity: s.identity + self.identities,
        }));
        Self {
            slots,
            width: self.width + right.width,
            identities: self.identities + right.identities,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn identity_count(&self) -> usize {
        self.identities
    }

    pub fn slot(&self, extent: &str) -> Option<&ExtentSlot> {
        self.slots.iter().find(|s| s.name == extent)
    }

    /// Resolves a column of `extent` to a value position. An empty extent
    /// name addresses the row positionally.
    pub fn resolve(&self, extent: &str, index: usize) -> Option<usize> {
        if extent.is_empty() {
            return Some(index);
        }
        self.slot(extent)
            .filter(|s| index < s.width)
            .map(|s| s.offset + index)
    }
}

/// A row yielded by a cursor: values plus the identity of every object
/// that contributed to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRow {
    values: Vec<Value>,
    identities: Vec<Option<RowId>>,
    layout: Arc<RowLayout>,
}

impl ResultRow {
    pub fn new(values: Vec<Value>, identities: Vec<Option<RowId>>, layout: Arc<RowLayout>) -> Self {
        Self {
            values,
            identities,
            layout,
        }
    }

    /// A row with no columns, used to evaluate row-independent expressions.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Arc::new(RowLayout::default()))
    }

    /// Wraps a stored record.
    pub fn from_record(row: &Row, layout: Arc<RowLayout>) -> Self {
        Self::new(row.values().to_vec(), vec![Some(row.id())], layout)
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    #[inline]
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

    #[inline]
    pub fn identities(&self) -> &[Option<RowId>] {
        &self.identities
    }

    /// Identity of the first object in the row.
    pub fn identity(&self) -> Option<RowId> {
        self.identities.first().copied().flatten()
    }

    #[inline]
    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Looks up a column of `extent`.
    pub fn column(&self, extent: &str, index: usize) -> Option<&Value> {
        self.layout.resolve(extent, index).and_then(|i| self.values.get(i))
    }

    /// Identity of the object in the `extent` slot.
    pub fn identity_of(&self, extent: &str) -> Option<RowId> {
        let slot = self.layout.slot(extent)?;
        self.identities.get(slot.identity).copied().flatten()
    }

    /// Concatenates two rows under a precomputed joined layout.
    pub fn join(&self, right: &ResultRow, layout: Arc<RowLayout>) -> Self {
        let mut values = Vec::with_capacity(self.values.len() + right.values.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&right.values);
        let mut identities = self.identities.clone();
        identities.extend_from_slice(&right.identities);
        Self::new(values, identities, layout)
    }

    /// Extends this row with NULLs for a missing right side.
    pub fn join_null(&self, right: &RowLayout, layout: Arc<RowLayout>) -> Self {
        let mut values = self.values.clone();
        values.resize(self.values.len() + right.width(), Value::Null);
        let mut identities = self.identities.clone();
        identities.resize(self.identities.len() + right.identity_count(), None);
        Self::new(values, identities, layout)
    }
}

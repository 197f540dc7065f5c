//! Record storage for a single extent.
//!
//! `RowStore` keeps records ordered by identity (storage order) and
//! maintains one ordered index per `IndexDef` of the extent schema. Index
//! entries are `(key, identity)` pairs, so every index position is unique
//! even when keys repeat, and a scan can be re-opened strictly after (or at)
//! any position it has delivered before.

use crate::key_range::KeyRange;
use resumedb_core::schema::{IndexDef, Table};
use resumedb_core::{Error, Result, Row, RowId, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

/// Order in which an index is walked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScanDirection {
    /// Ascending key order.
    #[default]
    Forward,
    /// Descending key order.
    Backward,
}

/// Where a re-opened scan starts relative to its anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekMode {
    /// Strictly after the anchor.
    After,
    /// At the anchor if it still exists, otherwise after it.
    AtOrAfter,
}

/// Anchor for re-opening an index scan.
#[derive(Clone, Copy, Debug)]
pub struct IndexSeek<'a> {
    pub key: &'a Value,
    pub identity: RowId,
    pub mode: SeekMode,
}

/// An ordered single-column index.
#[derive(Clone, Debug)]
pub struct OrderedIndex {
    column: usize,
    unique: bool,
    entries: BTreeSet<(Value, RowId)>,
}

impl OrderedIndex {
    fn new(column: usize, unique: bool) -> Self {
        Self {
            column,
            unique,
            entries: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    #[inline]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when another record already holds `key`.
    fn conflicts(&self, key: &Value, id: RowId) -> bool {
        // NULL keys never collide
        self.unique
            && !key.is_null()
            && self
                .entries
                .range((key.clone(), RowId::MIN)..=(key.clone(), RowId::MAX))
                .any(|(_, other)| *other != id)
    }

    fn insert(&mut self, key: Value, id: RowId) {
        self.entries.insert((key, id));
    }

    fn remove(&mut self, key: &Value, id: RowId) {
        self.entries.remove(&(key.clone(), id));
    }

    /// Returns the `(key, identity)` pairs inside `range` in `direction`
    /// order, optionally starting from a seek anchor.
    pub fn range(
        &self,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: Option<IndexSeek<'_>>,
    ) -> Vec<(Value, RowId)> {
        self.range_with_limit(range, direction, seek, None)
    }

    /// Like `range`, stopping after `limit` entries.
    pub fn range_with_limit(
        &self,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: Option<IndexSeek<'_>>,
        limit: Option<usize>,
    ) -> Vec<(Value, RowId)> {
        let (mut lower, mut upper) = entry_bounds(range);
        if let Some(seek) = seek {
            let anchor = (seek.key.clone(), seek.identity);
            let anchor = match seek.mode {
                SeekMode::After => Bound::Excluded(anchor),
                SeekMode::AtOrAfter => Bound::Included(anchor),
            };
            match direction {
                ScanDirection::Forward => lower = tighter(lower, anchor, Ordering::Greater),
                ScanDirection::Backward => upper = tighter(upper, anchor, Ordering::Less),
            }
        }
        if is_empty_interval(&lower, &upper) {
            return Vec::new();
        }
        let limit = limit.unwrap_or(usize::MAX);
        let iter = self.entries.range((lower, upper)).cloned();
        match direction {
            ScanDirection::Forward => iter.take(limit).collect(),
            ScanDirection::Backward => iter.rev().take(limit).collect(),
        }
    }
}

/// Translates a key range into bounds over `(key, identity)` entries.
fn entry_bounds(range: &KeyRange<Value>) -> (Bound<(Value, RowId)>, Bound<(Value, RowId)>) {
    let low = |v: &Value, exclusive: bool| {
        if exclusive {
            Bound::Excluded((v.clone(), RowId::MAX))
        } else {
            Bound::Included((v.clone(), RowId::MIN))
        }
    };
    let high = |v: &Value, exclusive: bool| {
        if exclusive {
            Bound::Excluded((v.clone(), RowId::MIN))
        } else {
            Bound::Included((v.clone(), RowId::MAX))
        }
    };
    match range {
        KeyRange::All => (Bound::Unbounded, Bound::Unbounded),
        KeyRange::Only(v) => (low(v, false), high(v, false)),
        KeyRange::LowerBound { value, exclusive } => (low(value, *exclusive), Bound::Unbounded),
        KeyRange::UpperBound { value, exclusive } => (Bound::Unbounded, high(value, *exclusive)),
        KeyRange::Bound {
            lower,
            upper,
            lower_exclusive,
            upper_exclusive,
        } => (low(lower, *lower_exclusive), high(upper, *upper_exclusive)),
    }
}

fn bound_value<T>(bound: &Bound<T>) -> Option<&T> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

/// Picks the more restrictive of two bounds. `wins` is the ordering of `a`
/// against `b` that makes `a` the tighter one (Greater for lower bounds).
fn tighter<T: Ord>(a: Bound<T>, b: Bound<T>, wins: Ordering) -> Bound<T> {
    let keep_a = match (bound_value(&a), bound_value(&b)) {
        (None, _) => false,
        (_, None) => true,
        (Some(x), Some(y)) => match x.cmp(y) {
            Ordering::Equal => matches!(a, Bound::Excluded(_)),
            ord => ord == wins,
        },
    };
    if keep_a {
        a
    } else {
        b
    }
}

fn is_empty_interval<T: Ord>(lower: &Bound<T>, upper: &Bound<T>) -> bool {
    match (bound_value(lower), bound_value(upper)) {
        (Some(l), Some(u)) => match l.cmp(u) {
            Ordering::Greater => true,
            Ordering::Equal => {
                !(matches!(lower, Bound::Included(_)) && matches!(upper, Bound::Included(_)))
            }
            Ordering::Less => false,
        },
        _ => false,
    }
}

/// Records of one extent plus their secondary indexes.
#[derive(Clone, Debug)]
pub struct RowStore {
    schema: Table,
    rows: BTreeMap<RowId, Arc<Row>>,
    indexes: BTreeMap<String, OrderedIndex>,
}

impl RowStore {
    /// Creates an empty store with an index for every index in `schema`.
    pub fn new(schema: Table) -> Result<Self> {
        let mut indexes = BTreeMap::new();
        for def in schema.indices() {
            indexes.insert(def.name().to_string(), Self::index_for(&schema, def)?);
        }
        Ok(Self {
            schema,
            rows: BTreeMap::new(),
            indexes,
        })
    }

    fn index_for(schema: &Table, def: &IndexDef) -> Result<OrderedIndex> {
        let column = schema
            .get_column_index(def.column())
            .ok_or_else(|| Error::column_not_found(schema.name(), def.column()))?;
        Ok(OrderedIndex::new(column, def.is_unique()))
    }

    #[inline]
    pub fn schema(&self) -> &Table {
        &self.schema
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Gets a record by identity.
    pub fn get(&self, id: RowId) -> Option<Arc<Row>> {
        self.rows.get(&id).cloned()
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Gets an index by name.
    pub fn index(&self, name: &str) -> Result<&OrderedIndex> {
        self.indexes
            .get(name)
            .ok_or_else(|| Error::index_not_found(self.schema.name(), name))
    }

    fn validate(&self, values: &[Value]) -> Result<()> {
        let columns = self.schema.columns();
        if values.len() != columns.len() {
            return Err(Error::ColumnCount {
                table: self.schema.name().to_string(),
                expected: columns.len(),
                got: values.len(),
            });
        }
        for (column, value) in columns.iter().zip(values) {
            if column.accepts(value) {
                continue;
            }
            return Err(match value.data_type() {
                None => Error::null_constraint(column.name()),
                Some(got) => Error::type_mismatch(column.data_type(), got),
            });
        }
        Ok(())
    }

    fn check_unique(&self, id: RowId, values: &[Value]) -> Result<()> {
        for (name, index) in &self.indexes {
            let key = &values[index.column];
            if index.conflicts(key, id) {
                return Err(Error::unique_constraint(name.as_str(), key.clone()));
            }
        }
        Ok(())
    }

    /// Inserts a record. Nothing changes when validation fails.
    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        self.validate(row.values())?;
        let id = row.id();
        if self.rows.contains_key(&id) {
            return Err(Error::invalid_schema(format!(
                "Identity {} already stored in {}",
                id,
                self.schema.name()
            )));
        }
        self.check_unique(id, row.values())?;
        for index in self.indexes.values_mut() {
            index.insert(row.values()[index.column].clone(), id);
        }
        self.rows.insert(id, Arc::new(row));
        Ok(id)
    }

    /// Replaces the values of a record, keeping its identity.
    pub fn update(&mut self, id: RowId, values: Vec<Value>) -> Result<Arc<Row>> {
        self.validate(&values)?;
        self.check_unique(id, &values)?;
        let old = self.rows.get(&id).cloned().ok_or(Error::row_not_found(id))?;
        for index in self.indexes.values_mut() {
            index.remove(&old.values()[index.column], id);
            index.insert(values[index.column].clone(), id);
        }
        let mut row = (*old).clone();
        row.replace_values(values);
        let row = Arc::new(row);
        self.rows.insert(id, Arc::clone(&row));
        Ok(row)
    }

    /// Deletes a record by identity.
    pub fn delete(&mut self, id: RowId) -> Result<Arc<Row>> {
        let row = self.rows.remove(&id).ok_or(Error::row_not_found(id))?;
        for index in self.indexes.values_mut() {
            index.remove(&row.values()[index.column], id);
        }
        Ok(row)
    }

    /// Returns every record in storage order.
    pub fn scan(&self) -> Vec<Arc<Row>> {
        self.rows.values().cloned().collect()
    }

    /// Returns the records after (or at) `identity` in storage order.
    pub fn scan_from(&self, identity: RowId, mode: SeekMode) -> Vec<Arc<Row>> {
        self.scan_with_limit(Some((identity, mode)), None)
    }

    /// Returns at most `limit` records in storage order, optionally
    /// starting after (or at) an identity.
    pub fn scan_with_limit(&self, after: Option<(RowId, SeekMode)>, limit: Option<usize>) -> Vec<Arc<Row>> {
        let start = match after {
            Some((identity, SeekMode::After)) => Bound::Excluded(identity),
            Some((identity, SeekMode::AtOrAfter)) => Bound::Included(identity),
            None => Bound::Unbounded,
        };
        self.rows
            .range((start, Bound::Unbounded))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, row)| Arc::clone(row))
            .collect()
    }

    /// Walks an index, returning each key with its record.
    pub fn index_scan(
        &self,
        index: &str,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: Option<IndexSeek<'_>>,
    ) -> Result<Vec<(Value, Arc<Row>)>> {
        self.index_scan_with_limit(index, range, direction, seek, None)
    }

    /// Gets index entries with their records, stopping after `limit`.
    pub fn index_scan_with_limit(
        &self,
        index: &str,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: Option<IndexSeek<'_>>,
        limit: Option<usize>,
    ) -> Result<Vec<(Value, Arc<Row>)>> {
        let entries = self.index(index)?.range_with_limit(range, direction, seek, limit);
        Ok(entries
            .into_iter()
            .filter_map(|(key, id)| self.rows.get(&id).map(|row| (key, Arc::clone(row))))
            .collect())
    }

    /// Adds an index and backfills it from the stored records.
    pub fn create_index(&mut self, def: IndexDef) -> Result<()> {
        let mut schema = self.schema.clone();
        schema.add_index(def.clone())?;
        let mut index = Self::index_for(&schema, &def)?;
        for (id, row) in &self.rows {
            let key = &row.values()[index.column];
            if index.conflicts(key, *id) {
                return Err(Error::unique_constraint(def.name(), key.clone()));
            }
            index.insert(key.clone(), *id);
        }
        self.indexes.insert(def.name().to_string(), index);
        self.schema = schema;
        Ok(())
    }

    /// Drops an index.
    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        self.schema.remove_index(name)?;
        self.indexes.remove(name);
        Ok(())
    }
}

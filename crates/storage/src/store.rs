//! Versioned store state shared by the writer and open snapshots.
//!
//! `MemoryStore` publishes its state as an `Arc<StoreState>`. A write
//! mutates the state in place when no snapshot holds it and copies the
//! touched extent otherwise, so an open snapshot never observes a later
//! write.

use crate::row_store::RowStore;
use crate::transaction::Snapshot;
use hashbrown::HashMap;
use resumedb_core::schema::{IndexDef, Table};
use resumedb_core::{next_row_id, Error, Result, Row, RowId, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// One committed version of every extent.
#[derive(Clone, Debug, Default)]
pub struct StoreState {
    tables: BTreeMap<String, Arc<RowStore>>,
    /// Identity -> owning extent.
    owners: HashMap<RowId, String>,
    version: u64,
}

impl StoreState {
    /// Gets an extent by name.
    pub fn table(&self, name: &str) -> Result<&RowStore> {
        self.tables
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| Error::table_not_found(name))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns the extent names.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    /// Resolves an identity to its extent and record.
    pub fn get_object(&self, id: RowId) -> Option<(&str, Arc<Row>)> {
        let extent = self.owners.get(&id)?;
        let row = self.tables.get(extent)?.get(id)?;
        Some((extent.as_str(), row))
    }

    /// Number of committed writes that produced this state.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut RowStore> {
        self.tables
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| Error::table_not_found(name))
    }
}

/// In-memory object store with snapshot reads and autocommit writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Arc<StoreState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a read transaction over the current state.
    pub fn begin(&self) -> Snapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot::new(Arc::clone(&state))
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let state = Arc::make_mut(&mut *guard);
        let out = f(state)?;
        state.version += 1;
        Ok(out)
    }

    /// Creates an extent.
    pub fn create_table(&self, schema: Table) -> Result<()> {
        self.write(|state| {
            let name = schema.name().to_string();
            if state.tables.contains_key(&name) {
                return Err(Error::invalid_schema(format!(
                    "Table already exists: {}",
                    name
                )));
            }
            state.tables.insert(name.clone(), Arc::new(RowStore::new(schema)?));
            debug!(table = %name, "created extent");
            Ok(())
        })
    }

    /// Drops an extent and forgets the identities it owned.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.write(|state| {
            let table = state
                .tables
                .remove(name)
                .ok_or_else(|| Error::table_not_found(name))?;
            for row in table.scan() {
                state.owners.remove(&row.id());
            }
            debug!(table = %name, "dropped extent");
            Ok(())
        })
    }

    /// Adds a secondary index to an extent.
    pub fn create_index(&self, def: IndexDef) -> Result<()> {
        self.write(|state| {
            let table = def.table_name().to_string();
            state.table_mut(&table)?.create_index(def)
        })
    }

    /// Drops a secondary index.
    pub fn drop_index(&self, table: &str, index: &str) -> Result<()> {
        self.write(|state| state.table_mut(table)?.drop_index(index))
    }

    /// Inserts a new object, returning its identity.
    pub fn insert(&self, table: &str, values: Vec<Value>) -> Result<RowId> {
        self.write(|state| {
            let id = state.table_mut(table)?.insert(Row::new(next_row_id(), values))?;
            state.owners.insert(id, table.to_string());
            Ok(id)
        })
    }

    /// Replaces the values of an object.
    pub fn update(&self, id: RowId, values: Vec<Value>) -> Result<()> {
        self.write(|state| {
            let table = state.owners.get(&id).cloned().ok_or(Error::row_not_found(id))?;
            state.table_mut(&table)?.update(id, values)?;
            Ok(())
        })
    }

    /// Deletes an object by identity.
    pub fn delete(&self, id: RowId) -> Result<Arc<Row>> {
        self.write(|state| {
            let table = state.owners.get(&id).cloned().ok_or(Error::row_not_found(id))?;
            let row = state.table_mut(&table)?.delete(id)?;
            state.owners.remove(&id);
            Ok(row)
        })
    }

    /// Returns the number of objects currently stored in an extent.
    pub fn row_count(&self, table: &str) -> Result<usize> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.table(table)?.len())
    }
}

//! Secondary index definition.

use alloc::string::String;

/// An ordered single-column index over an extent.
///
/// Entries are ordered by `(key, identity)`, so scans over equal keys are
/// deterministic.
#[derive(Clone, Debug)]
pub struct IndexDef {
    name: String,
    table_name: String,
    column: String,
    unique: bool,
}

impl IndexDef {
    /// Creates a new index definition.
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            column: column.into(),
            unique: false,
        }
    }

    /// Sets whether this index is unique.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the indexed column name.
    #[inline]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[inline]
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

impl PartialEq for IndexDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.table_name == other.table_name
    }
}

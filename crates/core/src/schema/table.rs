//! Extent (table) definition.

use super::column::Column;
use super::index::IndexDef;
use crate::error::{Error, Result};
use crate::types::DataType;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// The schema of one extent.
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    indices: Vec<IndexDef>,
}

impl Table {
    /// Creates a new table with the given name and columns.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_index(i))
            .collect();
        Self {
            name: name.into(),
            columns,
            indices: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn indices(&self) -> &[IndexDef] {
        &self.indices
    }

    /// Gets a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Gets a column position by name.
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Gets an index by name.
    pub fn get_index(&self, name: &str) -> Option<&IndexDef> {
        self.indices.iter().find(|i| i.name() == name)
    }

    /// Adds an index after creation, validating it against the columns.
    pub fn add_index(&mut self, index: IndexDef) -> Result<()> {
        check_naming_rules(index.name())?;
        if self.get_index(index.name()).is_some() {
            return Err(Error::invalid_schema(format!(
                "Index already exists: {}",
                index.name()
            )));
        }
        match self.get_column(index.column()) {
            None => return Err(Error::column_not_found(&self.name, index.column())),
            Some(c) if !c.data_type().is_indexable() => {
                return Err(Error::invalid_schema(format!(
                    "Column is not indexable: {}",
                    index.column()
                )))
            }
            Some(_) => {}
        }
        self.indices.push(index);
        Ok(())
    }

    /// Removes an index by name, returning its definition.
    pub fn remove_index(&mut self, name: &str) -> Result<IndexDef> {
        let pos = self
            .indices
            .iter()
            .position(|i| i.name() == name)
            .ok_or_else(|| Error::index_not_found(&self.name, name))?;
        Ok(self.indices.remove(pos))
    }
}

/// Validates that a name is an identifier.
fn check_naming_rules(name: &str) -> Result<()> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(Error::invalid_schema("Name cannot be empty")),
        Some(first) if !first.is_ascii_alphabetic() && first != '_' => {
            return Err(Error::invalid_schema(format!(
                "Name must start with letter or underscore: {}",
                name
            )))
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::invalid_schema(format!(
            "Name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}

/// Builder for extent definitions.
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        check_naming_rules(&name)?;
        Ok(Self {
            table: Table::new(name, Vec::new()),
        })
    }

    /// Adds a column to the table.
    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        let name = name.into();
        check_naming_rules(&name)?;
        if self.table.get_column(&name).is_some() {
            return Err(Error::invalid_schema(format!(
                "Column already exists: {}",
                name
            )));
        }
        let position = self.table.columns.len();
        self.table
            .columns
            .push(Column::new(name, data_type).with_index(position));
        Ok(self)
    }

    /// Marks columns as nullable.
    pub fn add_nullable(mut self, columns: &[&str]) -> Self {
        for name in columns {
            if let Some(col) = self.table.columns.iter_mut().find(|c| c.name() == *name) {
                *col = col.clone().nullable(true);
            }
        }
        self
    }

    /// Adds a single-column index.
    pub fn add_index(mut self, name: impl Into<String>, column: &str, unique: bool) -> Result<Self> {
        let index = IndexDef::new(name, self.table.name.clone(), column).unique(unique);
        self.table.add_index(index)?;
        Ok(self)
    }

    /// Builds the table definition.
    pub fn build(self) -> Result<Table> {
        if self.table.columns.is_empty() {
            return Err(Error::invalid_schema(format!(
                "Table {} has no columns",
                self.table.name
            )));
        }
        Ok(self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Table {
        TableBuilder::new("Account")
            .unwrap()
            .add_column("accountid", DataType::Int64)
            .unwrap()
            .add_column("owner", DataType::String)
            .unwrap()
            .add_index("idx_accountid", "accountid", true)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_table_builder() {
        let table = account();
        assert_eq!(table.name(), "Account");
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.get_column_index("owner"), Some(1));
        assert!(table.get_index("idx_accountid").unwrap().is_unique());
    }

    #[test]
    fn test_invalid_column_name() {
        let result = TableBuilder::new("Account")
            .unwrap()
            .add_column("123invalid", DataType::Int32);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_column() {
        let result = TableBuilder::new("Account")
            .unwrap()
            .add_column("accountid", DataType::Int64)
            .unwrap()
            .add_column("accountid", DataType::Int64);
        assert!(result.is_err());
    }

    #[test]
    fn test_index_on_unknown_column() {
        let result = TableBuilder::new("Account")
            .unwrap()
            .add_column("accountid", DataType::Int64)
            .unwrap()
            .add_index("idx_missing", "missing", false);
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_add_and_remove_index() {
        let mut table = account();
        table
            .add_index(IndexDef::new("idx_owner", "Account", "owner"))
            .unwrap();
        assert!(table.add_index(IndexDef::new("idx_owner", "Account", "owner")).is_err());
        assert_eq!(table.remove_index("idx_owner").unwrap().column(), "owner");
        assert!(table.remove_index("idx_owner").is_err());
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(TableBuilder::new("Empty").unwrap().build().is_err());
    }
}

//! Column definition.

use crate::types::DataType;
use crate::value::Value;
use alloc::string::String;

/// A column of an extent.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
    /// Position of the column in stored rows (0-based).
    index: usize,
}

impl Column {
    /// Creates a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: data_type.is_nullable_by_default(),
            index: 0,
        }
    }

    /// Sets whether this column is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns the column position.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns whether `value` may be stored in this column.
    ///
    /// Integers of either width are accepted by both integer columns.
    pub fn accepts(&self, value: &Value) -> bool {
        match value.data_type() {
            None => self.nullable,
            Some(dt) if dt == self.data_type => true,
            Some(DataType::Int32) | Some(DataType::Int64) => {
                matches!(self.data_type, DataType::Int32 | DataType::Int64)
            }
            Some(_) => false,
        }
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data_type == other.data_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_new() {
        let col = Column::new("accountid", DataType::Int64);
        assert_eq!(col.name(), "accountid");
        assert_eq!(col.data_type(), DataType::Int64);
        assert!(!col.is_nullable());
    }

    #[test]
    fn test_reference_column_nullable_by_default() {
        assert!(Column::new("owner", DataType::Reference).is_nullable());
    }

    #[test]
    fn test_column_accepts() {
        let col = Column::new("amount", DataType::Int64);
        assert!(col.accepts(&Value::Int64(1)));
        assert!(col.accepts(&Value::Int32(1)));
        assert!(!col.accepts(&Value::String("1".into())));
        assert!(!col.accepts(&Value::Null));
        assert!(col.clone().nullable(true).accepts(&Value::Null));
    }
}

//! Error types for schema and store operations.

use crate::row::RowId;
use crate::types::DataType;
use crate::value::Value;
use alloc::string::String;
use core::fmt;

/// Result type alias for core and store operations.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Type mismatch error.
    TypeMismatch { expected: DataType, got: DataType },
    /// Null constraint violation.
    NullConstraint { column: String },
    /// Unique index violation.
    UniqueConstraint { index: String, value: Value },
    /// No record with this identity is visible.
    RowNotFound { id: RowId },
    /// Invalid schema definition.
    InvalidSchema { message: String },
    /// Column not found.
    ColumnNotFound { table: String, column: String },
    /// Extent not found.
    TableNotFound { name: String },
    /// Index not found.
    IndexNotFound { table: String, index: String },
    /// Wrong number of values for the extent.
    ColumnCount { table: String, expected: usize, got: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TypeMismatch { expected, got } => {
                write!(f, "Type mismatch: expected {:?}, got {:?}", expected, got)
            }
            Error::NullConstraint { column } => {
                write!(f, "Null constraint violation on column: {}", column)
            }
            Error::UniqueConstraint { index, value } => {
                write!(f, "Unique constraint violation on index {}: {}", index, value)
            }
            Error::RowNotFound { id } => write!(f, "No object with identity {}", id),
            Error::InvalidSchema { message } => write!(f, "Invalid schema: {}", message),
            Error::ColumnNotFound { table, column } => {
                write!(f, "Column {} not found in table {}", column, table)
            }
            Error::TableNotFound { name } => write!(f, "Table not found: {}", name),
            Error::IndexNotFound { table, index } => {
                write!(f, "Index {} not found in table {}", index, table)
            }
            Error::ColumnCount { table, expected, got } => write!(
                f,
                "Table {} expects {} values, got {}",
                table, expected, got
            ),
        }
    }
}

impl Error {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates a null constraint error.
    pub fn null_constraint(column: impl Into<String>) -> Self {
        Error::NullConstraint {
            column: column.into(),
        }
    }

    /// Creates a unique constraint error.
    pub fn unique_constraint(index: impl Into<String>, value: Value) -> Self {
        Error::UniqueConstraint {
            index: index.into(),
            value,
        }
    }

    pub fn row_not_found(id: RowId) -> Self {
        Error::RowNotFound { id }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates an index not found error.
    pub fn index_not_found(table: impl Into<String>, index: impl Into<String>) -> Self {
        Error::IndexNotFound {
            table: table.into(),
            index: index.into(),
        }
    }
}

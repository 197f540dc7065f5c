//! Result type binding.
//!
//! A compiled projection describes the shape of its rows; callers name the
//! shape they expect. `ResultTypeBinding::check` decides whether the two
//! are compatible.

use crate::error::{EngineError, EngineResult};
use resumedb_core::DataType;
use std::fmt;

/// Result type requested by a caller. Part of the plan cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResultType {
    /// Untyped rows; accepts any projection.
    Rows,
    /// One object of the named extent per row.
    Object(String),
    /// A single value column.
    Scalar(DataType),
    /// A fixed tuple of value columns.
    Tuple(Vec<DataType>),
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultType::Rows => write!(f, "rows"),
            ResultType::Object(extent) => write!(f, "object {}", extent),
            ResultType::Scalar(dt) => write!(f, "scalar {:?}", dt),
            ResultType::Tuple(types) => {
                write!(f, "tuple(")?;
                for (i, dt) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", dt)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// What a projected column holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// An object of the named extent (a `Value::Reference`).
    Object(String),
    /// A value; `None` when the type is only known at run time.
    Value(Option<DataType>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectedColumn {
    pub name: String,
    pub kind: ColumnKind,
}

impl ProjectedColumn {
    pub fn object(name: impl Into<String>, extent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Object(extent.into()),
        }
    }

    pub fn value(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Value(Some(data_type)),
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Value(None),
        }
    }

    fn accepts(&self, expected: DataType) -> bool {
        match &self.kind {
            ColumnKind::Object(_) => expected == DataType::Reference,
            ColumnKind::Value(None) => true,
            ColumnKind::Value(Some(actual)) => {
                *actual == expected || (actual.is_numeric() && expected.is_numeric() && widens(*actual, expected))
            }
        }
    }
}

/// Integer columns may be read at a wider numeric type.
fn widens(from: DataType, to: DataType) -> bool {
    matches!(
        (from, to),
        (DataType::Int32, DataType::Int64)
            | (DataType::Int32, DataType::Float64)
            | (DataType::Int64, DataType::Float64)
    )
}

/// Projection shape of a compiled query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultTypeBinding {
    columns: Option<Vec<ProjectedColumn>>,
}

impl ResultTypeBinding {
    pub fn new(columns: Vec<ProjectedColumn>) -> Self {
        Self {
            columns: Some(columns),
        }
    }

    /// A binding whose shape is unknown (`SELECT *` style). Only
    /// `ResultType::Rows` is accepted.
    pub fn untyped() -> Self {
        Self { columns: None }
    }

    pub fn columns(&self) -> Option<&[ProjectedColumn]> {
        self.columns.as_deref()
    }

    /// Checks a requested result type against this shape.
    pub fn check(&self, expected: &ResultType) -> EngineResult<()> {
        if self.accepts(expected) {
            Ok(())
        } else {
            Err(EngineError::ResultTypeMismatch {
                expected: expected.to_string(),
                actual: self.describe(),
            })
        }
    }

    fn accepts(&self, expected: &ResultType) -> bool {
        let columns = match (&self.columns, expected) {
            (_, ResultType::Rows) => return true,
            (None, _) => return false,
            (Some(columns), _) => columns,
        };
        match expected {
            ResultType::Rows => true,
            ResultType::Object(extent) => matches!(
                columns.as_slice(),
                [ProjectedColumn { kind: ColumnKind::Object(e), .. }] if e == extent
            ),
            ResultType::Scalar(dt) => columns.len() == 1 && columns[0].accepts(*dt),
            ResultType::Tuple(types) => {
                columns.len() == types.len() && columns.iter().zip(types).all(|(c, dt)| c.accepts(*dt))
            }
        }
    }

    /// Human-readable shape, used in mismatch errors and plan rendering.
    pub fn describe(&self) -> String {
        let Some(columns) = &self.columns else {
            return "untyped rows".into();
        };
        let parts: Vec<String> = columns
            .iter()
            .map(|c| match &c.kind {
                ColumnKind::Object(extent) => format!("{}: {}", c.name, extent),
                ColumnKind::Value(Some(dt)) => format!("{}: {:?}", c.name, dt),
                ColumnKind::Value(None) => format!("{}: ?", c.name),
            })
            .collect();
        format!("({})", parts.join(", "))
    }
}

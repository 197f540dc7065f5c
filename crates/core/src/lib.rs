//! resumedb Core - value, row and schema types shared by the store and the
//! query engine.
//!
//! - `DataType`: storable types, including object references
//! - `Value`: runtime cell values with a total order usable as index keys
//! - `Row`: a stored record addressed by its object identity (`RowId`)
//! - `schema`: extent definitions (columns and single-column indexes)
//! - `Error`: errors raised by schema and store operations
//!
//! # Example
//!
//! ```rust
//! use resumedb_core::{DataType, Value, Row};
//! use resumedb_core::schema::TableBuilder;
//!
//! let account = TableBuilder::new("Account")
//!     .unwrap()
//!     .add_column("accountid", DataType::Int64)
//!     .unwrap()
//!     .add_column("owner", DataType::String)
//!     .unwrap()
//!     .add_index("idx_accountid", "accountid", true)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! assert_eq!(account.columns().len(), 2);
//!
//! let row = Row::new(7, vec![Value::Int64(1), Value::String("Alice".into())]);
//! assert_eq!(row.id(), 7);
//! assert_eq!(row.get(1), Some(&Value::String("Alice".into())));
//! ```

#![no_std]

extern crate alloc;

mod error;
pub mod pattern_match;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use row::{next_row_id, Row, RowId};
pub use types::DataType;
pub use value::Value;

//! resumedb Storage - the in-memory object store queries read from.
//!
//! - `RowStore`: records of one extent with ordered secondary indexes
//! - `MemoryStore`: all extents, autocommit writes, snapshot reads
//! - `Snapshot`: a read transaction pinned to one committed version
//! - `KeyRange`: index key ranges
//!
//! # Example
//!
//! ```rust
//! use resumedb_storage::{KeyRange, MemoryStore, ScanDirection};
//! use resumedb_core::schema::TableBuilder;
//! use resumedb_core::{DataType, Value};
//!
//! let store = MemoryStore::new();
//! let schema = TableBuilder::new("Account")
//!     .unwrap()
//!     .add_column("accountid", DataType::Int64)
//!     .unwrap()
//!     .add_index("idx_accountid", "accountid", true)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! store.create_table(schema).unwrap();
//! for n in 0..5 {
//!     store.insert("Account", vec![Value::Int64(n)]).unwrap();
//! }
//!
//! let snapshot = store.begin();
//! let range = KeyRange::lower_bound(Value::Int64(3), false);
//! let hits = snapshot
//!     .index_scan("Account", "idx_accountid", &range, ScanDirection::Forward, None)
//!     .unwrap();
//! assert_eq!(hits.len(), 2);
//! ```

pub mod key_range;
pub mod row_store;
pub mod store;
pub mod transaction;

pub use key_range::KeyRange;
pub use row_store::{IndexSeek, OrderedIndex, RowStore, ScanDirection, SeekMode};
pub use store::{MemoryStore, StoreState};
pub use transaction::{Snapshot, TransactionId, TransactionState};

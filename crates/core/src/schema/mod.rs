//! Extent schema: columns and single-column secondary indexes.

mod column;
mod index;
mod table;

pub use column::Column;
pub use index::IndexDef;
pub use table::{Table, TableBuilder};

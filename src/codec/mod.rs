//! Typed row codec and schema registry (THE CORE §4.1-4.2): versioned binary
//! row encoding with schema evolution, backed by borrowed readers rather than
//! owned string pieces.

pub mod row;
pub mod schema;
pub mod value;
pub mod varint;

pub use row::{encode_row, read_through, RowReader, RowUpdater, RowWriter};
pub use schema::{Column, Schema, SchemaBuilder, SchemaOwner, SchemaProvider, SchemaRegistry};
pub use value::{ColumnType, Value};

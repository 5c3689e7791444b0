//! Secondary index maintenance (THE CORE §4.7): on every vertex/edge write,
//! build the new index key bytes from the incoming columns, the old index
//! key bytes from the pre-existing row (unless the caller proves none
//! exists), and emit the `put`/`delete` pair into the *same* atomic batch as
//! the data write. Index entries live in the partition of the row they
//! index; index scans return owning tails that `storage-svc` then
//! point-gets to apply post-filters.

use crate::codec::row::RowReader;
use crate::codec::schema::{Schema, SchemaOwner, SchemaProvider};
use crate::codec::value::{ColumnType, Value};
use crate::codec::varint;
use crate::error::{Error, Result};
use crate::keylayout;
use crate::kv::KvOp;
use std::collections::HashMap;
use std::sync::RwLock;

/// Declares one index: the ordered list of columns it covers, over one
/// tag or edge type within a space.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub index_id: u32,
    pub space_id: u32,
    pub owner: SchemaOwner,
    pub name: String,
    pub columns: Vec<String>,
}

/// Encodes one column's value into the index key's `column_bytes`. Fixed
/// width columns are written as-is so lexicographic key order matches value
/// order for those types; variable-width columns (`string`, and `int` which
/// is varint-encoded in the row body) get a varint length prefix so a
/// multi-column index key remains unambiguous to split back into columns —
/// this generalizes spec.md's "NULL-separated" scheme to be binary-safe
/// (a raw NUL separator cannot survive a string value that itself contains
/// NUL bytes).
fn encode_index_column(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Bool(b) => out.push(if *b { 1 } else { 0 }),
        Value::Float(f) => out.extend_from_slice(&f.to_be_bytes()),
        Value::Double(d) => out.extend_from_slice(&d.to_be_bytes()),
        Value::Vid(v) | Value::Timestamp(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::Int(i) => {
            varint::encode_u64(varint::zigzag_encode(*i), out);
        }
        Value::String(s) => {
            varint::encode_u64(s.len() as u64, out);
            out.extend_from_slice(s);
        }
        Value::Null => {}
    }
}

impl IndexDef {
    /// `index_id(4B) || column_bytes` computed from a full row read through
    /// `schema`. Fails with `NameNotFound` if the index references a column
    /// the schema no longer carries (should not happen: schemas are
    /// append-only).
    pub fn encode_key_columns(&self, row: &RowReader, schema: &Schema) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for col_name in &self.columns {
            schema
                .index_of(col_name)
                .ok_or_else(|| Error::NameNotFound(col_name.clone()))?;
            let value = row.get_by_name(col_name)?;
            encode_index_column(&value, &mut bytes);
        }
        Ok(bytes)
    }
}

/// Registry of indexes, keyed by the (space, owner) they cover. Read-mostly:
/// `storage-svc` consults it on every write; index creation/drop are rare.
#[derive(Default)]
pub struct IndexManager {
    by_owner: RwLock<HashMap<(u32, SchemaOwner), Vec<IndexDef>>>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_index(&self, def: IndexDef) {
        let key = (def.space_id, def.owner);
        self.by_owner.write().unwrap().entry(key).or_default().push(def);
    }

    pub fn drop_index(&self, space_id: u32, owner: SchemaOwner, index_id: u32) {
        let key = (space_id, owner);
        if let Some(defs) = self.by_owner.write().unwrap().get_mut(&key) {
            defs.retain(|d| d.index_id != index_id);
        }
    }

    pub fn indexes_for(&self, space_id: u32, owner: SchemaOwner) -> Vec<IndexDef> {
        self.by_owner
            .read()
            .unwrap()
            .get(&(space_id, owner))
            .cloned()
            .unwrap_or_default()
    }

    /// Builds the index maintenance ops for one row write: for every index
    /// on `owner`, `put`s the new index key and, if an old row was supplied
    /// and its indexed columns differ, `delete`s the stale key. Appended
    /// into the same atomic batch as the data write by the caller — this
    /// function only computes ops, it never writes.
    ///
    /// `skip_pre_read = true` (bulk load, caller proves no prior row
    /// exists) skips the old-key computation entirely; stale index entries
    /// become the caller's problem, matching spec.md §4.7.
    pub fn maintenance_ops(
        &self,
        partition_id: u32,
        space_id: u32,
        owner: SchemaOwner,
        schema: &Schema,
        owning_tail: &[u8],
        old_row: Option<&RowReader>,
        new_row: &RowReader,
        skip_pre_read: bool,
    ) -> Result<Vec<KvOp>> {
        let mut ops = Vec::new();
        for def in self.indexes_for(space_id, owner) {
            let new_cols = def.encode_key_columns(new_row, schema)?;
            let new_key = keylayout::index_key(partition_id, def.index_id, &new_cols, owning_tail);

            if !skip_pre_read {
                if let Some(old_row) = old_row {
                    let old_cols = def.encode_key_columns(old_row, schema)?;
                    if old_cols != new_cols {
                        let old_key = keylayout::index_key(partition_id, def.index_id, &old_cols, owning_tail);
                        ops.push(KvOp::Remove { key: old_key });
                    }
                }
            }
            ops.push(KvOp::Put { key: new_key, value: owning_tail.to_vec() });
        }
        Ok(ops)
    }
}

#[allow(dead_code)]
fn column_type_of(schema: &Schema, name: &str) -> Option<ColumnType> {
    schema.index_of(name).and_then(|i| schema.field(i)).map(|c| c.col_type)
}

impl IndexManager {
    /// Ops to remove every index entry pointing at a row that is being
    /// deleted outright (no replacement row follows). Used by
    /// `DeleteVertices`/`DeleteEdges`.
    pub fn delete_ops(
        &self,
        partition_id: u32,
        space_id: u32,
        owner: SchemaOwner,
        schema: &Schema,
        owning_tail: &[u8],
        old_row: &RowReader,
    ) -> Result<Vec<KvOp>> {
        let mut ops = Vec::new();
        for def in self.indexes_for(space_id, owner) {
            let cols = def.encode_key_columns(old_row, schema)?;
            let key = keylayout::index_key(partition_id, def.index_id, &cols, owning_tail);
            ops.push(KvOp::Remove { key });
        }
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::row::encode_row;
    use crate::codec::schema::{Column, SchemaBuilder};
    use std::sync::Arc;

    fn schema_with_a_b() -> Arc<Schema> {
        Arc::new(
            SchemaBuilder::new(0)
                .column(Column::new("a", ColumnType::Int))
                .column(Column::new("b", ColumnType::String))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn insert_then_update_replaces_stale_index_entry() {
        let schema = schema_with_a_b();
        let mgr = IndexManager::new();
        mgr.create_index(IndexDef {
            index_id: 9,
            space_id: 1,
            owner: SchemaOwner::Tag(1),
            name: "idx_a_b".into(),
            columns: vec!["a".into(), "b".into()],
        });

        let old_bytes =
            encode_row(&schema, &[Some(Value::Int(1)), Some(Value::String(b"x".to_vec()))]).unwrap();
        let new_bytes =
            encode_row(&schema, &[Some(Value::Int(1)), Some(Value::String(b"y".to_vec()))]).unwrap();
        let old_row = RowReader::new(schema.clone(), &old_bytes).unwrap();
        let new_row = RowReader::new(schema.clone(), &new_bytes).unwrap();

        let owning_tail = 42i64.to_be_bytes().to_vec();
        let ops = mgr
            .maintenance_ops(0, 1, SchemaOwner::Tag(1), &schema, &owning_tail, Some(&old_row), &new_row, false)
            .unwrap();

        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], KvOp::Remove { .. }));
        assert!(matches!(ops[1], KvOp::Put { .. }));
    }

    #[test]
    fn bulk_load_skips_pre_read_and_only_emits_put() {
        let schema = schema_with_a_b();
        let mgr = IndexManager::new();
        mgr.create_index(IndexDef {
            index_id: 9,
            space_id: 1,
            owner: SchemaOwner::Tag(1),
            name: "idx_a".into(),
            columns: vec!["a".into()],
        });
        let bytes = encode_row(&schema, &[Some(Value::Int(1)), Some(Value::String(b"x".to_vec()))]).unwrap();
        let row = RowReader::new(schema.clone(), &bytes).unwrap();
        let ops = mgr
            .maintenance_ops(0, 1, SchemaOwner::Tag(1), &schema, &[], None, &row, true)
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], KvOp::Put { .. }));
    }

    #[test]
    fn unchanged_columns_emit_no_delete() {
        let schema = schema_with_a_b();
        let mgr = IndexManager::new();
        mgr.create_index(IndexDef {
            index_id: 9,
            space_id: 1,
            owner: SchemaOwner::Tag(1),
            name: "idx_a".into(),
            columns: vec!["a".into()],
        });
        let bytes = encode_row(&schema, &[Some(Value::Int(1)), Some(Value::String(b"x".to_vec()))]).unwrap();
        let row = RowReader::new(schema.clone(), &bytes).unwrap();
        let ops = mgr
            .maintenance_ops(0, 1, SchemaOwner::Tag(1), &schema, &[], Some(&row), &row, false)
            .unwrap();
        assert_eq!(ops.len(), 1);
    }
}

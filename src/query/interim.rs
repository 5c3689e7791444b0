//! Interim result (THE CORE §4.9): the rowset-plus-schema carried between
//! executors. Owns its rows; nothing borrows across executor boundaries,
//! resolving the design note against `StringPiece`-into-owned-buffer
//! readers — a `Value` here is always owned.

use crate::codec::value::Value;
use crate::error::{Error, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct InterimResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl InterimResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| Error::NameNotFound(column.to_string()))
    }

    /// All values of `column` interpreted as vertex ids — the shape `Go`
    /// and `Fetch` consume from an upstream interim result.
    pub fn get_vids(&self, column: &str) -> Result<Vec<i64>> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .map(|row| match &row[idx] {
                Value::Vid(v) | Value::Int(v) => Ok(*v),
                _ => Err(Error::IncompatibleType(column.to_string())),
            })
            .collect()
    }

    pub fn get_rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Builds a hash index over `column`'s values to their row positions,
    /// for a subsequent hash-join step (`Set` and multi-hop `Go` use this
    /// instead of a nested-loop scan).
    pub fn build_index(&self, column: &str) -> Result<HashMap<Vec<u8>, Vec<usize>>> {
        let idx = self.column_index(column)?;
        let mut map: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
        for (row_idx, row) in self.rows.iter().enumerate() {
            map.entry(value_key(&row[idx])).or_default().push(row_idx);
        }
        Ok(map)
    }

    /// Whether `self` and `other` have the structurally identical column
    /// list `Set` requires (spec.md §4.9).
    pub fn same_shape(&self, other: &InterimResult) -> bool {
        self.columns == other.columns
    }
}

fn value_key(value: &Value) -> Vec<u8> {
    match value {
        Value::Bool(b) => vec![*b as u8],
        Value::Int(i) | Value::Vid(i) | Value::Timestamp(i) => i.to_be_bytes().to_vec(),
        Value::Float(f) => f.to_be_bytes().to_vec(),
        Value::Double(d) => d.to_be_bytes().to_vec(),
        Value::String(s) => s.clone(),
        Value::Null => Vec::new(),
    }
}

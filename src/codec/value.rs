//! Typed column values and the cast rules between them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Double,
    String,
    Vid,
    Timestamp,
}

impl ColumnType {
    /// Fixed encoded width in bytes, or `None` for variable-length types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::Bool => Some(1),
            ColumnType::Float => Some(4),
            ColumnType::Double => Some(8),
            ColumnType::Vid | ColumnType::Timestamp => Some(8),
            ColumnType::Int | ColumnType::String => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(Vec<u8>),
    Vid(i64),
    Timestamp(i64),
    Null,
}

impl Value {
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Int(_) => Some(ColumnType::Int),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Double(_) => Some(ColumnType::Double),
            Value::String(_) => Some(ColumnType::String),
            Value::Vid(_) => Some(ColumnType::Vid),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn zero_for(col_type: ColumnType) -> Value {
        match col_type {
            ColumnType::Bool => Value::Bool(false),
            ColumnType::Int => Value::Int(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Double => Value::Double(0.0),
            ColumnType::String => Value::String(Vec::new()),
            ColumnType::Vid => Value::Vid(0),
            ColumnType::Timestamp => Value::Timestamp(0),
        }
    }

    /// Cast this value to `target`, following the widening/narrowing rules:
    /// int -> bool: non-zero is true; int/vid/timestamp: identity; double ->
    /// int: truncation toward zero; string -> numeric: parse, else
    /// `IncompatibleType`; bool <-> numeric: false=0, true=1.
    pub fn cast(&self, target: ColumnType, col_name: &str) -> Result<Value> {
        use ColumnType::*;
        let incompat = || Error::IncompatibleType(col_name.to_string());

        if let Some(t) = self.column_type() {
            if t == target {
                return Ok(self.clone());
            }
        }

        match (self, target) {
            (Value::Bool(b), Int) => Ok(Value::Int(if *b { 1 } else { 0 })),
            (Value::Bool(b), Float) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            (Value::Bool(b), Double) => Ok(Value::Double(if *b { 1.0 } else { 0.0 })),
            (Value::Int(i), Bool) => Ok(Value::Bool(*i != 0)),
            (Value::Int(i), Vid) => Ok(Value::Vid(*i)),
            (Value::Int(i), Timestamp) => Ok(Value::Timestamp(*i)),
            (Value::Vid(i), Int) => Ok(Value::Int(*i)),
            (Value::Vid(i), Timestamp) => Ok(Value::Timestamp(*i)),
            (Value::Timestamp(i), Int) => Ok(Value::Int(*i)),
            (Value::Timestamp(i), Vid) => Ok(Value::Vid(*i)),
            (Value::Int(i), Float) => Ok(Value::Float(*i as f32)),
            (Value::Int(i), Double) => Ok(Value::Double(*i as f64)),
            (Value::Double(d), Int) => Ok(Value::Int(d.trunc() as i64)),
            (Value::Float(f), Int) => Ok(Value::Int(f.trunc() as i64)),
            (Value::Double(d), Bool) => Ok(Value::Bool(*d != 0.0)),
            (Value::Float(f), Bool) => Ok(Value::Bool(*f != 0.0)),
            (Value::Double(d), Float) => Ok(Value::Float(*d as f32)),
            (Value::Float(f), Double) => Ok(Value::Double(*f as f64)),
            (Value::String(s), Int) | (Value::String(s), Vid) | (Value::String(s), Timestamp) => {
                let text = std::str::from_utf8(s).map_err(|_| incompat())?;
                let i: i64 = text.trim().parse().map_err(|_| incompat())?;
                match target {
                    Vid => Ok(Value::Vid(i)),
                    Timestamp => Ok(Value::Timestamp(i)),
                    _ => Ok(Value::Int(i)),
                }
            }
            (Value::String(s), Float) => {
                let text = std::str::from_utf8(s).map_err(|_| incompat())?;
                text.trim().parse().map(Value::Float).map_err(|_| incompat())
            }
            (Value::String(s), Double) => {
                let text = std::str::from_utf8(s).map_err(|_| incompat())?;
                text.trim().parse().map(Value::Double).map_err(|_| incompat())
            }
            (Value::String(s), Bool) => {
                let text = std::str::from_utf8(s).map_err(|_| incompat())?;
                match text.trim() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    _ => Err(incompat()),
                }
            }
            (Value::Null, _) => Ok(Value::Null),
            _ => Err(incompat()),
        }
    }

    /// `set_float` widens to double losslessly (floats are exact as doubles).
    pub fn widen_float_to_double(f: f32) -> Value {
        Value::Double(f as f64)
    }

    /// `set_double` on a `float` column narrows; returns `ValueOutOfRange`
    /// when the value does not round-trip through `f32` rather than
    /// silently truncating.
    pub fn narrow_double_to_float(d: f64, col_name: &str) -> Result<Value> {
        let narrowed = d as f32;
        if (narrowed as f64) == d {
            Ok(Value::Float(narrowed))
        } else {
            Err(Error::ValueOutOfRange(col_name.to_string()))
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Vid(a), Value::Vid(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}
impl Eq for Value {}

/// Total order over values of the same discriminant, needed for composite
/// index keys (spec.md §4.3, §4.7). Values of different discriminants order
/// by discriminant index; NaN floats sort after all other float values of
/// the same sign via `f64::total_cmp`/`f32::total_cmp`.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        fn tag(v: &Value) -> u8 {
            match v {
                Value::Bool(_) => 0,
                Value::Int(_) => 1,
                Value::Float(_) => 2,
                Value::Double(_) => 3,
                Value::String(_) => 4,
                Value::Vid(_) => 5,
                Value::Timestamp(_) => 6,
                Value::Null => 7,
            }
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Vid(a), Value::Vid(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            _ => tag(self).cmp(&tag(other)),
        }
    }
}
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_to_bool_nonzero_is_true() {
        assert_eq!(Value::Int(5).cast(ColumnType::Bool, "x").unwrap(), Value::Bool(true));
        assert_eq!(Value::Int(0).cast(ColumnType::Bool, "x").unwrap(), Value::Bool(false));
    }

    #[test]
    fn double_to_int_truncates_toward_zero() {
        assert_eq!(Value::Double(-3.9).cast(ColumnType::Int, "x").unwrap(), Value::Int(-3));
        assert_eq!(Value::Double(3.9).cast(ColumnType::Int, "x").unwrap(), Value::Int(3));
    }

    #[test]
    fn string_to_numeric_parses_or_errors() {
        assert_eq!(Value::String(b"42".to_vec()).cast(ColumnType::Int, "x").unwrap(), Value::Int(42));
        assert!(Value::String(b"nope".to_vec()).cast(ColumnType::Int, "x").is_err());
    }

    #[test]
    fn narrow_double_rejects_lossy_values() {
        assert!(Value::narrow_double_to_float(1.0, "x").is_ok());
        assert!(Value::narrow_double_to_float(1e308, "x").is_err());
    }

    #[test]
    fn value_ordering_is_total_across_floats() {
        let mut vs = vec![Value::Double(3.0), Value::Double(f64::NAN), Value::Double(-1.0)];
        vs.sort();
        assert_eq!(vs[0], Value::Double(-1.0));
    }
}

//! Pushdown filter expressions evaluated directly against a decoded row,
//! without materializing it into the query layer first. `GetNeighbors`
//! applies one of these to each candidate edge before it ever reaches the
//! query-exec pipeline; `UpdateVertex`/`UpdateEdge` apply one to decide
//! whether an update applies at all.

use crate::codec::row::RowReader;
use crate::codec::value::Value;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum FilterExpr {
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering> {
    use Value::*;
    match (a, b) {
        (Int(x), Int(y)) => Ok(x.cmp(y)),
        (Vid(x), Vid(y)) | (Timestamp(x), Timestamp(y)) => Ok(x.cmp(y)),
        (Double(x), Double(y)) => x.partial_cmp(y).ok_or(Error::InvalidFilter("NaN comparison".into())),
        (Float(x), Float(y)) => x.partial_cmp(y).ok_or(Error::InvalidFilter("NaN comparison".into())),
        (String(x), String(y)) => Ok(x.cmp(y)),
        (Bool(x), Bool(y)) => Ok(x.cmp(y)),
        _ => Err(Error::InvalidFilter("incomparable operand types".into())),
    }
}

impl FilterExpr {
    pub fn eval(&self, row: &RowReader) -> Result<bool> {
        use FilterExpr::*;
        match self {
            Eq(name, v) => Ok(values_eq(&row.get_by_name(name)?, v)),
            Ne(name, v) => Ok(!values_eq(&row.get_by_name(name)?, v)),
            Lt(name, v) => Ok(compare(&row.get_by_name(name)?, v)? == std::cmp::Ordering::Less),
            Le(name, v) => Ok(compare(&row.get_by_name(name)?, v)? != std::cmp::Ordering::Greater),
            Gt(name, v) => Ok(compare(&row.get_by_name(name)?, v)? == std::cmp::Ordering::Greater),
            Ge(name, v) => Ok(compare(&row.get_by_name(name)?, v)? != std::cmp::Ordering::Less),
            And(l, r) => Ok(l.eval(row)? && r.eval(row)?),
            Or(l, r) => Ok(l.eval(row)? || r.eval(row)?),
            Not(inner) => Ok(!inner.eval(row)?),
        }
    }

    /// Whether every column this filter references is in `columns` — the
    /// condition under which `GetNeighbors` may push the filter down to the
    /// edge scan instead of evaluating it after the join with source-tag
    /// properties (spec.md §4.9, "filter refers only to edge columns in the
    /// forward direction").
    pub fn references_only(&self, columns: &[&str]) -> bool {
        use FilterExpr::*;
        match self {
            Eq(n, _) | Ne(n, _) | Lt(n, _) | Le(n, _) | Gt(n, _) | Ge(n, _) => {
                columns.contains(&n.as_str())
            }
            And(l, r) | Or(l, r) => l.references_only(columns) && r.references_only(columns),
            Not(inner) => inner.references_only(columns),
        }
    }
}

fn values_eq(a: &Value, b: &Value) -> bool {
    use Value::*;
    match (a, b) {
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Vid(x), Vid(y)) | (Timestamp(x), Timestamp(y)) => x == y,
        (String(x), String(y)) => x == y,
        (Double(x), Double(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Null, Null) => true,
        _ => false,
    }
}

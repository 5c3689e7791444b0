//! Scenario 2: schema-version read-through (spec §8 seed test 2).

use samyama::codec::{encode_row, read_through, Column, ColumnType, SchemaBuilder, Value};
use std::sync::Arc;

#[test]
fn column_added_in_v1_reads_back_as_default_for_v0_rows() {
    let mut v0 = SchemaBuilder::new(0);
    for i in 0..8 {
        v0 = v0.column(Column::new(format!("col{i:02}"), ColumnType::Int));
    }
    let v0 = Arc::new(v0.build().unwrap());

    let values: Vec<Option<Value>> = (0..8).map(|i| Some(Value::Int(i as i64))).collect();
    let encoded = encode_row(&v0, &values).unwrap();

    let mut v1 = SchemaBuilder::new(1);
    for i in 0..8 {
        v1 = v1.column(Column::new(format!("col{i:02}"), ColumnType::Int));
    }
    v1 = v1.column(
        Column::new("col9", ColumnType::String)
            .with_default(Value::String(b"".to_vec()))
            .unwrap(),
    );
    let v1 = v1.build().unwrap();

    let row = read_through(&encoded, v0, &v1).unwrap();
    for i in 0..8usize {
        assert_eq!(row[&format!("col{i:02}")], Value::Int(i as i64));
    }
    assert_eq!(row["col9"], Value::String(b"".to_vec()));
}

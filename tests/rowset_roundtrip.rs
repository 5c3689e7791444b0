//! Scenario 1: all-ints rowset round-trip (spec §8 seed test 1).

use samyama::codec::{encode_row, Column, ColumnType, RowReader, SchemaBuilder, Value};
use std::sync::Arc;

#[test]
fn thirty_three_int_columns_ten_rows_round_trip_in_order() {
    let mut builder = SchemaBuilder::new(0);
    for i in 0..33 {
        builder = builder.column(Column::new(format!("col{i:02}"), ColumnType::Int));
    }
    let schema = Arc::new(builder.build().unwrap());

    let mut encoded_rows = Vec::new();
    for k in 0..10i64 {
        let values: Vec<Option<Value>> =
            (0..33).map(|i| Some(Value::Int(100 * k + i as i64 + 1))).collect();
        encoded_rows.push(encode_row(&schema, &values).unwrap());
    }

    for (k, encoded) in encoded_rows.iter().enumerate() {
        let reader = RowReader::new(schema.clone(), encoded).unwrap();
        for i in 0..33usize {
            let expected = 100 * k as i64 + i as i64 + 1;
            assert_eq!(reader.get_by_index(i).unwrap(), Value::Int(expected));
        }
    }
}

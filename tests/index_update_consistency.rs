//! Scenario 5: index + update consistency (spec §8 seed test 5).

use samyama::codec::{encode_row, Column, ColumnType, RowReader, SchemaBuilder, Value};
use samyama::graph::{partition_of, Space, SpaceManager};
use samyama::index::{IndexDef, IndexManager};
use samyama::kv::KvEngine;
use samyama::storage::{StorageService, UpdateExpr, UpdateItem, VertexWrite};
use samyama::{SchemaOwner, SchemaRegistry};
use std::sync::Arc;
use tempfile::TempDir;

const SPACE_ID: u32 = 1;
const TAG_ID: u32 = 10;
const INDEX_ID: u32 = 1;
const PARTITION_COUNT: u32 = 4;

fn index_columns_for(schema: &Arc<samyama::codec::Schema>, def: &IndexDef, a: i64, b: &str) -> Vec<u8> {
    let encoded = encode_row(schema, &[Some(Value::Int(a)), Some(Value::String(b.as_bytes().to_vec()))]).unwrap();
    let row = RowReader::new(schema.clone(), &encoded).unwrap();
    def.encode_key_columns(&row, schema).unwrap()
}

#[tokio::test]
async fn updating_indexed_columns_moves_the_index_entry_and_keeps_exactly_one_copy() {
    let dir = TempDir::new().unwrap();
    let kv = Arc::new(KvEngine::open(dir.path(), &[]).unwrap());
    kv.create_space(SPACE_ID).unwrap();

    let schema_registry = Arc::new(SchemaRegistry::new());
    schema_registry
        .install(
            SPACE_ID,
            SchemaOwner::Tag(TAG_ID),
            SchemaBuilder::new(0)
                .column(Column::new("a", ColumnType::Int))
                .column(Column::new("b", ColumnType::String))
                .build()
                .unwrap(),
        )
        .unwrap();
    let schema = schema_registry.get(SPACE_ID, SchemaOwner::Tag(TAG_ID), None).unwrap();

    let index = Arc::new(IndexManager::new());
    let def = IndexDef {
        index_id: INDEX_ID,
        space_id: SPACE_ID,
        owner: SchemaOwner::Tag(TAG_ID),
        name: "idx_a_b".into(),
        columns: vec!["a".into(), "b".into()],
    };
    index.create_index(def.clone());

    let spaces = Arc::new(SpaceManager::new());
    spaces.create(Space::new(SPACE_ID, "demo", PARTITION_COUNT, 1)).unwrap();

    let svc = StorageService { schema: schema_registry, kv: kv.clone(), index: index.clone(), spaces };

    svc.add_vertices(
        SPACE_ID,
        vec![VertexWrite { vid: 1, tag_id: TAG_ID, values: vec![Some(Value::Int(1)), Some(Value::String(b"x".to_vec()))] }],
        true,
        false,
    )
    .await
    .unwrap();

    svc.update_vertex(
        SPACE_ID,
        1,
        TAG_ID,
        vec![UpdateItem { column: "b".into(), expr: UpdateExpr::Literal(Value::String(b"y".to_vec())) }],
        None,
        false,
    )
    .await
    .unwrap();

    let partition_id = partition_of(1, PARTITION_COUNT);

    let old_cols = index_columns_for(&schema, &def, 1, "x");
    let old_hits = svc.lookup_index(SPACE_ID, INDEX_ID, old_cols).await.unwrap();
    assert!(old_hits.is_empty(), "the stale (1, \"x\") index entry must be gone after the update");

    let new_cols = index_columns_for(&schema, &def, 1, "y");
    let new_hits = svc.lookup_index(SPACE_ID, INDEX_ID, new_cols).await.unwrap();
    assert_eq!(new_hits, vec![1i64.to_be_bytes().to_vec()]);

    let mut total_entries = 0;
    for p in 0..PARTITION_COUNT {
        total_entries += kv.prefix_scan(SPACE_ID, &samyama::keylayout::index_prefix(p, INDEX_ID)).unwrap().len();
    }
    let _ = partition_id;
    assert_eq!(total_entries, 1, "exactly one index row should exist for the vertex after the update");
}

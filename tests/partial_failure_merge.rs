//! Scenario 6: partial-failure merge (spec §8 seed test 6).
//!
//! A single-process `KvEngine` backs every partition of a space through one
//! RocksDB column family, so a genuine per-partition *read* failure isn't
//! reachable without a real multi-node deployment. The write path doesn't
//! have that limitation: `add_edges` computes each edge's ops independently
//! and records a per-partition failure without aborting the other edges'
//! partitions, which is the same contract `GetNeighbors` uses for reads.
//! This exercises that contract through the query executor: one edge in
//! the batch has a value that doesn't cast to its column's type, the other
//! two don't, and the query reports partial success with a warning rather
//! than losing the edges that succeeded.

use samyama::codec::{Column, ColumnType, SchemaBuilder, Value};
use samyama::graph::{Space, SpaceManager};
use samyama::index::IndexManager;
use samyama::kv::KvEngine;
use samyama::storage::{EdgeWrite, GetNeighborsRequest, StorageService};
use samyama::{execute, ExecContext, Error, PlanNode, SchemaOwner, SchemaRegistry};
use std::sync::Arc;
use tempfile::TempDir;

const SPACE_ID: u32 = 1;
const EDGE_TYPE: i32 = 20;

#[tokio::test]
async fn one_bad_edge_fails_its_partition_while_the_others_commit_with_a_warning() {
    let dir = TempDir::new().unwrap();
    let kv = Arc::new(KvEngine::open(dir.path(), &[]).unwrap());
    kv.create_space(SPACE_ID).unwrap();

    let schema = Arc::new(SchemaRegistry::new());
    schema
        .install(
            SPACE_ID,
            SchemaOwner::Edge(EDGE_TYPE),
            SchemaBuilder::new(0).column(Column::new("weight", ColumnType::Int)).build().unwrap(),
        )
        .unwrap();

    let spaces = Arc::new(SpaceManager::new());
    spaces.create(Space::new(SPACE_ID, "demo", 4, 1)).unwrap();

    let storage = StorageService { schema, kv, index: Arc::new(IndexManager::new()), spaces };

    let node = PlanNode::InsertEdge {
        items: vec![
            EdgeWrite { src_vid: 1, edge_type: EDGE_TYPE, rank: 0, dst_vid: 2, values: vec![Some(Value::Int(5))] },
            EdgeWrite { src_vid: 3, edge_type: EDGE_TYPE, rank: 0, dst_vid: 4, values: vec![Some(Value::String(b"oops".to_vec()))] },
            EdgeWrite { src_vid: 5, edge_type: EDGE_TYPE, rank: 0, dst_vid: 6, values: vec![Some(Value::Int(7))] },
        ],
        overwrite: true,
    };

    let mut ctx = ExecContext { space_id: SPACE_ID, ..Default::default() };
    let err = execute(&node, &storage, &mut ctx).await.unwrap_err();
    assert!(matches!(err, Error::PartialResult(1)), "exactly one partition should have failed");
    assert_eq!(ctx.warnings.len(), 1, "the failure must surface as a query-level warning");

    let good_edges = storage
        .get_neighbors(GetNeighborsRequest { space_id: SPACE_ID, vids: vec![2, 6], edge_types: vec![-EDGE_TYPE], filter: None, sample_limit: None })
        .await
        .unwrap();
    assert_eq!(good_edges.per_vid[&2].edges.len(), 1, "the edge before the bad one must still have committed");
    assert_eq!(good_edges.per_vid[&6].edges.len(), 1, "the edge after the bad one must still have committed");

    let bad_edge = storage
        .get_neighbors(GetNeighborsRequest { space_id: SPACE_ID, vids: vec![4], edge_types: vec![-EDGE_TYPE], filter: None, sample_limit: None })
        .await
        .unwrap();
    assert!(bad_edge.per_vid[&4].edges.is_empty(), "the malformed edge must not have been written to either partition");
}

//! Storage service (THE CORE §4.8): partition-routed request handlers that
//! turn `AddVertices`/`AddEdges`/`GetNeighbors`/... into key-layout reads
//! and writes against the KV engine, with index maintenance folded into the
//! same atomic batch as every mutation.

pub mod filter;
pub mod service;

pub use filter::FilterExpr;
pub use service::{
    EdgeRecord, EdgeWrite, FailureMap, GetNeighborsRequest, GetNeighborsResult, StorageService,
    UpdateExpr, UpdateItem, VertexWrite, VidNeighbors, WriteOutcome,
};

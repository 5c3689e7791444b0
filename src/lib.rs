//! Samyama: a partitioned, Raft-replicated graph key-value store.
//!
//! THE CORE (see `SPEC_FULL.md`) is four pieces wired front-to-back:
//!
//! - [`codec`]: versioned row encoding and the schema registry schema
//!   evolution reads through.
//! - [`wal`] and [`raft`]: the per-partition durable log and the consensus
//!   group replicated over it.
//! - [`kv`] and [`keylayout`]: the multi-space KV façade and the key byte
//!   layout vertices/edges/indexes/system/listener entries share.
//! - [`storage`] and [`index`]: the request handlers (`AddVertices`,
//!   `GetNeighbors`, ...) and the secondary-index maintenance folded into
//!   every write's atomic batch.
//! - [`query`]: the executor pipeline (`Go`/`Fetch`/insert/update/`Set`/
//!   `Return`) built on top of `storage`.
//!
//! [`graph`] holds the shared vertex/edge identifiers and space registry;
//! [`config`] and [`error`] are the ambient configuration and error
//! taxonomy every layer above draws from. [`admin`] holds the two auxiliary
//! state machines (job executor, log monitor) and [`session`] the per-
//! connection and process-wide query state.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod admin;
pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod keylayout;
pub mod kv;
pub mod query;
pub mod raft;
pub mod session;
pub mod storage;
pub mod wal;

pub use admin::{JobCommand, JobDescription, JobManager, JobStatus, LogMonitor, LogMonitorConfig, MinLogLevel};
pub use codec::{Column, Schema, SchemaBuilder, SchemaOwner, SchemaProvider, SchemaRegistry, Value};
pub use config::ClusterConfig;
pub use error::{Error, Result};
pub use graph::{EdgeType, Rank, Space, SpaceManager, VertexId};
pub use kv::{KvEngine, KvOp};
pub use query::{execute, Direction, ExecContext, FetchSpec, FetchTarget, GoSpec, InterimResult, PlanNode, SetOp};
pub use raft::{RaftNode, RaftNodeId};
pub use session::{GlobalVariableHolder, Session, SessionId, SessionManager};
pub use storage::StorageService;

/// Crate version, surfaced to the CLI's `:version` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

//! What a committed log entry means to the partition's storage engine.
//!
//! A `Command` is the unit committed through Raft; per spec.md §4.4 an
//! `atomic_batch` is the consistency unit the KV engine exposes, so one
//! committed entry is either a single key-level mutation or a batch of them
//! applied together. Replaces the teacher's `GraphStateMachine`, which only
//! tracked a `last_applied_log` counter over direct `PersistenceManager`
//! calls rather than genuinely applying from a replicated log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    Batch(Vec<Command>),
}

/// The partition's storage engine, as seen by the Raft driver: apply a
/// committed command at `index`. Implemented by `kv::RaftKvSink` over the
/// real RocksDB-backed engine; tests use `NoopApplySink` or
/// `RecordingApplySink`.
#[async_trait]
pub trait ApplySink: Send + Sync {
    async fn apply(&self, index: u64, command: &Command);
}

pub struct NoopApplySink;

#[async_trait]
impl ApplySink for NoopApplySink {
    async fn apply(&self, _index: u64, _command: &Command) {}
}

#[cfg(test)]
pub struct RecordingApplySink {
    pub applied: std::sync::Mutex<Vec<(u64, Command)>>,
}

#[cfg(test)]
impl RecordingApplySink {
    pub fn new() -> Self {
        Self { applied: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
#[async_trait]
impl ApplySink for RecordingApplySink {
    async fn apply(&self, index: u64, command: &Command) {
        self.applied.lock().unwrap().push((index, command.clone()));
    }
}

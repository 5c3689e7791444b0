//! Shared wiring for the Raft integration scenarios: a small in-process
//! cluster of `RaftNode` tasks connected through `LocalTransport`, each
//! backed by its own `PartitionLog` and a sink that records every command
//! it applies so tests can assert on convergence.

use async_trait::async_trait;
use samyama::config::RaftConfig;
use samyama::raft::node::{RaftHandle, RaftNode};
use samyama::raft::{ApplySink, Command, LocalTransport, Membership, Message, RaftNodeId, RaftTransport};
use samyama::wal::PartitionLog;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub struct RecordingSink {
    pub applied: Mutex<Vec<(u64, Command)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { applied: Mutex::new(Vec::new()) }
    }

    pub fn applied_indices(&self) -> Vec<u64> {
        self.applied.lock().unwrap().iter().map(|(i, _)| *i).collect()
    }
}

#[async_trait]
impl ApplySink for RecordingSink {
    async fn apply(&self, index: u64, command: &Command) {
        self.applied.lock().unwrap().push((index, command.clone()));
    }
}

pub struct Cluster {
    pub handles: HashMap<RaftNodeId, RaftHandle>,
    pub sinks: HashMap<RaftNodeId, Arc<RecordingSink>>,
    _dirs: Vec<TempDir>,
}

impl Cluster {
    /// Proposes `command` through every handle and returns the (node, index)
    /// of whichever one is currently leader. `RaftState::propose` only
    /// succeeds on the leader, so exactly one handle should return `Some`.
    pub async fn propose_via_leader(&self, command: Command) -> Option<(RaftNodeId, u64)> {
        for (&id, handle) in &self.handles {
            if let Some(index) = handle.propose(command.clone()).await {
                return Some((id, index));
            }
        }
        None
    }

    pub fn stop(&self, id: RaftNodeId) {
        if let Some(handle) = self.handles.get(&id) {
            handle.stop();
        }
    }
}

/// Spins up one `RaftNode` per entry in `ids`, with `learner_ids` marked as
/// non-voting learners, all wired together through one shared
/// `LocalTransport`.
pub async fn spin_up_cluster(ids: &[RaftNodeId], learner_ids: &[RaftNodeId], config: RaftConfig) -> Cluster {
    let voters: Vec<RaftNodeId> = ids.iter().copied().filter(|i| !learner_ids.contains(i)).collect();
    let membership = Membership::new(voters, learner_ids.iter().copied());

    let mut raw_senders = HashMap::new();
    let mut raw_receivers = HashMap::new();
    for &id in ids {
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        raw_senders.insert(id, tx);
        raw_receivers.insert(id, rx);
    }
    let transport: Arc<dyn RaftTransport> = Arc::new(LocalTransport::new(raw_senders));

    let mut handles = HashMap::new();
    let mut sinks = HashMap::new();
    let mut dirs = Vec::new();
    for &id in ids {
        let dir = TempDir::new().unwrap();
        let log = PartitionLog::open(dir.path(), 64 * 1024 * 1024, 8 * 1024 * 1024).unwrap();
        let sink = Arc::new(RecordingSink::new());
        let handle = RaftNode::spawn(id, membership.clone(), log, transport.clone(), sink.clone(), config.clone(), 1);
        handles.insert(id, handle);
        sinks.insert(id, sink);
        dirs.push(dir);
    }

    for (id, mut rx) in raw_receivers {
        let handle = handles[&id].clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                handle.deliver(msg);
            }
        });
    }

    Cluster { handles, sinks, _dirs: dirs }
}

pub fn put_command(key: &str, value: &str) -> Command {
    Command::Put { key: key.as_bytes().to_vec(), value: value.as_bytes().to_vec() }
}

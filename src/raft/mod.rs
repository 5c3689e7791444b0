//! Per-partition Raft consensus (THE CORE §4.5): one independent Raft group
//! per `(space, partition)`, each driven by a single-threaded executor that
//! owns its [`state::RaftState`] exclusively.
//!
//! [`state`] is the pure, synchronous step function — no IO, no async,
//! fully unit-testable by feeding it ticks and messages directly. [`node`]
//! is the async driver: one tokio task per partition that owns the state,
//! the [`wal::PartitionLog`](crate::wal::PartitionLog), and a
//! [`transport::RaftTransport`] handle, wired together with `tokio::select!`
//! rather than promise/future callback chains. Membership changes (spec.md
//! §4.5) are one-at-a-time config-change records applied directly to
//! [`state::RaftState`]'s [`state::Membership`] — there is no separate
//! cluster-bookkeeping layer above it.

pub mod node;
pub mod state;
pub mod state_machine;
pub mod transport;

pub use node::RaftNode;
pub use state::{LogEntry, Membership, Message, RaftState, Role};
pub use state_machine::{ApplySink, Command};
pub use transport::{LocalTransport, RaftTransport};

pub type RaftNodeId = u64;

//! Peer transport for the consensus core. The actual RPC wire format and
//! connection management (Storage<->Storage peer traffic) is out of THE
//! CORE's scope; this trait is the interface the core consumes. Unlike the
//! teacher's `RaftNetwork::send`, which always returned a canned successful
//! response regardless of the message, `LocalTransport` genuinely routes
//! messages between independent [`super::state::RaftState`] actors so
//! election and replication tests exercise real consensus.

use super::state::Message;
use super::RaftNodeId;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

#[async_trait]
pub trait RaftTransport: Send + Sync {
    async fn send(&self, to: RaftNodeId, message: Message);
}

/// In-process transport wiring a fixed set of node mailboxes together.
/// Built once with every route known up front; delivery is silently
/// dropped for an unknown or disconnected peer, mirroring how a real RPC
/// transport would surface an unreachable node (the sender just never gets
/// a response and the caller's own timeout/retry handles it).
pub struct LocalTransport {
    routes: HashMap<RaftNodeId, mpsc::UnboundedSender<Message>>,
}

impl LocalTransport {
    pub fn new(routes: HashMap<RaftNodeId, mpsc::UnboundedSender<Message>>) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl RaftTransport for LocalTransport {
    async fn send(&self, to: RaftNodeId, message: Message) {
        if let Some(sender) = self.routes.get(&to) {
            let _ = sender.send(message);
        }
    }
}

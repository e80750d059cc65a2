//! Table of connected WebSocket peers.
//!
//! Each peer is a remote context; outbound payloads for it are queued on an
//! unbounded channel drained by the connection's write half.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::domain::ContextId;

/// Connected peers keyed by their context id.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<ContextId, mpsc::UnboundedSender<String>>,
}

impl PeerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer and returns its outbound queue.
    pub fn connect(&mut self) -> (ContextId, mpsc::UnboundedReceiver<String>) {
        let id = ContextId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.insert(id, tx);
        (id, rx)
    }

    /// Removes a peer. Returns `false` if it was not connected.
    pub fn disconnect(&mut self, id: ContextId) -> bool {
        self.peers.remove(&id).is_some()
    }

    /// Returns `true` if `id` is connected.
    #[must_use]
    pub fn contains(&self, id: ContextId) -> bool {
        self.peers.contains_key(&id)
    }

    /// Queues `payload` for `id`. Returns `false` if the peer is gone.
    pub fn send(&self, id: ContextId, payload: String) -> bool {
        self.peers
            .get(&id)
            .is_some_and(|tx| tx.send(payload).is_ok())
    }

    /// Number of connected peers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_reaches_nobody() {
        let table = PeerTable::new();
        assert!(!table.send(ContextId::new(), "x".to_string()));
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn connected_peer_receives_in_order() {
        let mut table = PeerTable::new();
        let (id, mut rx) = table.connect();
        assert!(table.contains(id));
        assert!(table.send(id, "a".to_string()));
        assert!(table.send(id, "b".to_string()));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("a"));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("b"));
    }

    #[test]
    fn disconnect_removes_peer() {
        let mut table = PeerTable::new();
        let (id, _rx) = table.connect();
        assert!(table.disconnect(id));
        assert!(!table.disconnect(id));
        assert!(!table.contains(id));
        assert!(!table.send(id, "late".to_string()));
    }
}

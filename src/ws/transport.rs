//! Transport adapter whose remote contexts are WebSocket peers.
//!
//! The server itself is a top-level context: its parent is itself and
//! payloads it sends to its own id are delivered back synchronously.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::peers::PeerTable;
use crate::domain::{ContextId, Target};
use crate::error::TransportError;
use crate::transport::{CallbackSlot, Inbound, ReceiveCallback, Transport};

#[derive(Debug)]
struct WsInner {
    id: ContextId,
    peers: Mutex<PeerTable>,
    slot: CallbackSlot,
}

/// WebSocket bridge endpoint. Clones share the same endpoint.
#[derive(Debug, Clone)]
pub struct WsTransport {
    inner: Arc<WsInner>,
}

impl WsTransport {
    /// Creates an endpoint with no peers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WsInner {
                id: ContextId::new(),
                peers: Mutex::new(PeerTable::new()),
                slot: CallbackSlot::new(),
            }),
        }
    }

    fn peers(&self) -> MutexGuard<'_, PeerTable> {
        self.inner.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new peer and returns its id and outbound queue.
    #[must_use]
    pub fn connect(&self) -> (ContextId, mpsc::UnboundedReceiver<String>) {
        self.peers().connect()
    }

    /// Forgets a peer.
    pub fn disconnect(&self, peer: ContextId) -> bool {
        self.peers().disconnect(peer)
    }

    /// Number of connected peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers().count()
    }

    /// Hands a payload received from `source` to the bound callback.
    /// Returns `false` when nothing is bound yet.
    pub fn deliver(&self, source: ContextId, payload: String) -> bool {
        self.inner.slot.deliver(Inbound {
            source: Some(source),
            payload,
        })
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    fn local_id(&self) -> ContextId {
        self.inner.id
    }

    fn resolve(&self, target: Target) -> Option<ContextId> {
        match target {
            Target::Parent => Some(self.inner.id),
            Target::Context(id) if id == self.inner.id || self.peers().contains(id) => Some(id),
            Target::Context(_) => None,
        }
    }

    fn send_raw(&self, destination: ContextId, payload: String) {
        if destination == self.inner.id {
            if !self.deliver(destination, payload) {
                tracing::debug!("ws transport dropped local payload: not bound");
            }
            return;
        }
        let sent = self.peers().send(destination, payload);
        if !sent {
            tracing::debug!(peer = %destination, "ws peer gone; payload dropped");
        }
    }

    fn bind(&self, callback: ReceiveCallback) -> Result<(), TransportError> {
        self.inner.slot.bind(callback)
    }
}

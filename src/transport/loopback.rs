//! Same-context transport: every payload sent to the local context is
//! delivered back synchronously, before `send_raw` returns.

use crate::domain::{ContextId, Target};
use crate::error::TransportError;

use super::{CallbackSlot, Inbound, ReceiveCallback, Transport};

/// A lone context with no peers. Its parent is itself.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    id: ContextId,
    slot: CallbackSlot,
}

impl LoopbackTransport {
    /// Creates a loopback endpoint with a fresh context id.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LoopbackTransport {
    fn local_id(&self) -> ContextId {
        self.id
    }

    fn resolve(&self, target: Target) -> Option<ContextId> {
        match target {
            Target::Parent => Some(self.id),
            Target::Context(id) if id == self.id => Some(id),
            Target::Context(_) => None,
        }
    }

    fn send_raw(&self, destination: ContextId, payload: String) {
        if destination != self.id {
            tracing::debug!(%destination, "loopback cannot reach foreign context");
            return;
        }
        let delivered = self.slot.deliver(Inbound {
            source: Some(self.id),
            payload,
        });
        if !delivered {
            tracing::debug!(context = %self.id, "loopback payload dropped: not bound");
        }
    }

    fn bind(&self, callback: ReceiveCallback) -> Result<(), TransportError> {
        self.slot.bind(callback)
    }
}

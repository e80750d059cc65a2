//! Transport adapters: the primitive that moves a serialized string between
//! contexts and raises an event on arrival.
//!
//! The pool never inspects its environment; the strategy is picked when the
//! pool is built:
//!
//! - [`LoopbackTransport`]: a single context echoing to itself synchronously.
//! - [`MemoryHub`]: several in-process contexts with queued, ordered delivery.
//! - [`crate::ws::WsTransport`]: WebSocket peers of the bridge server.

pub mod loopback;
pub mod memory;

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::domain::{ContextId, Target};
use crate::error::TransportError;

pub use loopback::LoopbackTransport;
pub use memory::{Envelope, MemoryHub, MemoryTransport};

/// A raw payload handed to the receive callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Sending context, when the transport knows it.
    pub source: Option<ContextId>,
    /// Serialized message.
    pub payload: String,
}

/// Receive callback installed by [`Transport::bind`].
pub type ReceiveCallback = Arc<dyn Fn(Inbound) + Send + Sync>;

/// Moves serialized messages between execution contexts.
///
/// Delivery is fire-and-forget and order-preserving per destination. There
/// is no acknowledgement.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Identity of the context this endpoint belongs to.
    fn local_id(&self) -> ContextId;

    /// Resolves a target to a concrete destination, or `None` when the
    /// target is not reachable from this endpoint.
    fn resolve(&self, target: Target) -> Option<ContextId>;

    /// Hands `payload` over for delivery to `destination`.
    fn send_raw(&self, destination: ContextId, payload: String);

    /// Installs the receive callback. Bindings last for the endpoint's
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyBound`] if a callback is already
    /// installed.
    fn bind(&self, callback: ReceiveCallback) -> Result<(), TransportError>;
}

/// Single-assignment holder for a receive callback.
#[derive(Default)]
pub struct CallbackSlot {
    callback: Mutex<Option<ReceiveCallback>>,
}

impl CallbackSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `callback` unless one is already present.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyBound`] if the slot is taken.
    pub fn bind(&self, callback: ReceiveCallback) -> Result<(), TransportError> {
        let mut slot = self
            .callback
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.is_some() {
            return Err(TransportError::AlreadyBound);
        }
        *slot = Some(callback);
        Ok(())
    }

    /// Returns the installed callback, if any.
    #[must_use]
    pub fn get(&self) -> Option<ReceiveCallback> {
        self.callback
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
    }

    /// Invokes the installed callback with `inbound`. Returns `false` when
    /// nothing is bound. The slot lock is not held during the call.
    pub fn deliver(&self, inbound: Inbound) -> bool {
        match self.get() {
            Some(callback) => {
                callback(inbound);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("bound", &self.get().is_some())
            .finish()
    }
}

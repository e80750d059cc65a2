//! In-process hub connecting several contexts.
//!
//! Sends are queued and nothing is delivered until [`MemoryHub::pump`] runs,
//! which mirrors the asynchronous delivery boundary of a real transport while
//! staying deterministic. Delivery is FIFO across the whole hub.
//!
//! The hub records every payload it carries (see [`MemoryHub::history`])
//! until [`MemoryHub::clear_history`] is called, so it suits tests and
//! short-lived embeddings rather than long-running traffic.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{ContextId, Target};
use crate::error::TransportError;

use super::{Inbound, ReceiveCallback, Transport};

/// A payload in flight or already sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sending context.
    pub source: ContextId,
    /// Receiving context.
    pub destination: ContextId,
    /// Serialized message.
    pub payload: String,
}

#[derive(Default)]
struct Endpoint {
    parent: Option<ContextId>,
    callback: Option<ReceiveCallback>,
}

#[derive(Default)]
struct HubState {
    endpoints: HashMap<ContextId, Endpoint>,
    queue: VecDeque<Envelope>,
    history: Vec<Envelope>,
}

/// Shared switchboard for [`MemoryTransport`] endpoints.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new top-level context.
    #[must_use]
    pub fn top_level(&self) -> MemoryTransport {
        self.endpoint(None)
    }

    /// Registers a new context embedded in `parent`.
    #[must_use]
    pub fn embedded(&self, parent: ContextId) -> MemoryTransport {
        self.endpoint(Some(parent))
    }

    fn endpoint(&self, parent: Option<ContextId>) -> MemoryTransport {
        let id = ContextId::new();
        self.lock().endpoints.insert(
            id,
            Endpoint {
                parent,
                callback: None,
            },
        );
        MemoryTransport {
            id,
            hub: self.clone(),
        }
    }

    /// Delivers queued payloads until the queue is empty, including payloads
    /// sent by the callbacks themselves. Returns how many reached a bound
    /// callback; payloads for unbound contexts are dropped.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        loop {
            let (envelope, callback) = {
                let mut state = self.lock();
                let Some(envelope) = state.queue.pop_front() else {
                    break;
                };
                let callback = state
                    .endpoints
                    .get(&envelope.destination)
                    .and_then(|e| e.callback.as_ref().map(Arc::clone));
                (envelope, callback)
            };
            match callback {
                Some(callback) => {
                    callback(Inbound {
                        source: Some(envelope.source),
                        payload: envelope.payload,
                    });
                    delivered += 1;
                }
                None => {
                    tracing::debug!(
                        destination = %envelope.destination,
                        "memory hub dropped payload: destination not bound"
                    );
                }
            }
        }
        delivered
    }

    /// Number of payloads waiting for [`Self::pump`].
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Every payload ever sent through the hub, in send order.
    #[must_use]
    pub fn history(&self) -> Vec<Envelope> {
        self.lock().history.clone()
    }

    /// Forgets recorded history. Queued payloads are unaffected.
    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    /// Payloads ever sent to `destination`, in send order.
    #[must_use]
    pub fn sent_to(&self, destination: ContextId) -> Vec<String> {
        self.lock()
            .history
            .iter()
            .filter(|e| e.destination == destination)
            .map(|e| e.payload.clone())
            .collect()
    }
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryHub")
            .field("endpoints", &state.endpoints.len())
            .field("pending", &state.queue.len())
            .finish()
    }
}

/// One context attached to a [`MemoryHub`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    id: ContextId,
    hub: MemoryHub,
}

impl Transport for MemoryTransport {
    fn local_id(&self) -> ContextId {
        self.id
    }

    fn resolve(&self, target: Target) -> Option<ContextId> {
        let state = self.hub.lock();
        match target {
            Target::Parent => state
                .endpoints
                .get(&self.id)
                .and_then(|e| e.parent)
                .or(Some(self.id)),
            Target::Context(id) => state.endpoints.contains_key(&id).then_some(id),
        }
    }

    fn send_raw(&self, destination: ContextId, payload: String) {
        let envelope = Envelope {
            source: self.id,
            destination,
            payload,
        };
        let mut state = self.hub.lock();
        state.history.push(envelope.clone());
        state.queue.push_back(envelope);
    }

    fn bind(&self, callback: ReceiveCallback) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        let endpoint = state
            .endpoints
            .get_mut(&self.id)
            .ok_or(TransportError::Closed)?;
        if endpoint.callback.is_some() {
            return Err(TransportError::AlreadyBound);
        }
        endpoint.callback = Some(callback);
        Ok(())
    }
}

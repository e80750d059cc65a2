//! Error types for the codec, transports, dispatch, and the pool.
//!
//! Protocol anomalies (malformed payloads, unresolvable targets) are
//! recovered and logged by the pool. Handler failures are returned to the
//! caller as [`DispatchError`] after every handler has run.

/// Wire encoding or decoding failure.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is not valid JSON, or a value could not be serialized.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload is valid JSON but not a `[name, ...args]` array.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(&'static str),

    /// The event name is empty.
    #[error("event name must not be empty")]
    EmptyEventName,
}

/// Transport adapter failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// A receive callback is already installed on this endpoint.
    #[error("transport endpoint already has a receive callback")]
    AlreadyBound,

    /// The endpoint has been shut down.
    #[error("transport endpoint closed")]
    Closed,
}

/// One or more handlers failed while dispatching an event.
///
/// Every handler in the dispatch snapshot ran; `failures` holds the errors
/// in invocation order.
#[derive(Debug, thiserror::Error)]
#[error("{} of {invoked} handler(s) failed for event `{event}`", .failures.len())]
pub struct DispatchError {
    /// Event name being dispatched.
    pub event: String,
    /// Number of handlers invoked.
    pub invoked: usize,
    /// Errors reported by failing handlers.
    pub failures: Vec<anyhow::Error>,
}

/// Message pool error.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Encoding an outbound or decoding an inbound message failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Binding to the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A handler failed during dispatch.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

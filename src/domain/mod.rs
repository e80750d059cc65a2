//! Domain layer: context identity, handlers, the handler registry, the
//! wire codec, and log sinks.
//!
//! Everything here is transport-agnostic. The [`crate::pool`] layer wires
//! these pieces to a [`crate::transport::Transport`].

pub mod codec;
pub mod context_id;
pub mod handler;
pub mod handler_registry;
pub mod log_sink;

pub use context_id::{ContextId, Target};
pub use handler::{Event, Handler, HandlerId};
pub use handler_registry::HandlerRegistry;
pub use log_sink::{LogEntry, LogSink, MemorySink, TracingSink};

//! Event handlers and the event value they consume.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::ContextId;

/// A decoded event as seen by handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name (first element of the wire array).
    pub name: String,
    /// Positional arguments, in wire order.
    pub args: Vec<Value>,
    /// Context the payload arrived from, when the transport reports it.
    pub source: Option<ContextId>,
}

impl Event {
    /// Creates an event with no known source.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            source: None,
        }
    }

    /// Returns the argument at `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

/// Identity of a [`Handler`], shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(uuid::Uuid);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signature of handler callbacks.
pub type HandlerFn = dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync;

/// A registered callback.
///
/// Registration and removal use reference identity: two handlers built from
/// identical closures are distinct, while clones of one `Handler` are the
/// same handler.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// Wraps a callback with a fresh identity.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: HandlerId(uuid::Uuid::new_v4()),
            func: Arc::new(func),
        }
    }

    /// Wraps an infallible callback.
    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self::new(move |event| {
            func(event);
            Ok(())
        })
    }

    /// Returns this handler's identity.
    #[must_use]
    pub const fn id(&self) -> HandlerId {
        self.id
    }

    /// Invokes the callback.
    ///
    /// # Errors
    ///
    /// Returns whatever error the callback reports.
    pub fn call(&self, event: &Event) -> anyhow::Result<()> {
        (self.func)(event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("id", &self.id).finish()
    }
}

//! Per-event handler tables.
//!
//! [`HandlerRegistry`] maps an event name to two ordered handler lists:
//! persistent handlers that run on every dispatch, and once handlers that
//! are taken and cleared as a whole right before they run. Removal compacts
//! the lists eagerly, so dispatch order is always insertion order.

use std::collections::HashMap;

use super::{Event, Handler};
use crate::error::DispatchError;

/// Handlers registered for a single event name.
#[derive(Debug, Default)]
struct Entry {
    persistent: Vec<Handler>,
    once: Vec<Handler>,
}

impl Entry {
    fn is_empty(&self) -> bool {
        self.persistent.is_empty() && self.once.is_empty()
    }
}

/// Event name → handler lists.
///
/// Not synchronised; the owning [`crate::pool::MessagePool`] guards it.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    entries: HashMap<String, Entry>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a persistent handler for `name`.
    ///
    /// Returns `false` (and changes nothing) if this handler is already
    /// registered as persistent for `name`.
    pub fn register(&mut self, name: &str, handler: Handler) -> bool {
        let entry = self.entries.entry(name.to_string()).or_default();
        push_unique(&mut entry.persistent, handler)
    }

    /// Adds a once handler for `name`.
    ///
    /// Same idempotence rule as [`Self::register`], in an independent list.
    pub fn register_once(&mut self, name: &str, handler: Handler) -> bool {
        let entry = self.entries.entry(name.to_string()).or_default();
        push_unique(&mut entry.once, handler)
    }

    /// Removes handlers for `name`.
    ///
    /// With `handler == None` every persistent and once handler for `name`
    /// goes; otherwise that single handler is removed from both lists.
    /// Returns whether anything was removed.
    pub fn unregister(&mut self, name: &str, handler: Option<&Handler>) -> bool {
        let Some(entry) = self.entries.get_mut(name) else {
            return false;
        };
        let removed = match handler {
            None => !entry.is_empty(),
            Some(handler) => {
                let before = entry.persistent.len() + entry.once.len();
                entry.persistent.retain(|h| h != handler);
                entry.once.retain(|h| h != handler);
                before != entry.persistent.len() + entry.once.len()
            }
        };
        if handler.is_none() || entry.is_empty() {
            self.entries.remove(name);
        }
        removed
    }

    /// Returns `true` if any handler of either kind exists for `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| !e.is_empty())
    }

    /// Returns the handlers a dispatch of `name` must run, in order.
    ///
    /// Persistent handlers are cloned; once handlers are taken, leaving the
    /// once list empty. A once handler registered after this call waits for
    /// the next dispatch.
    pub fn snapshot(&mut self, name: &str) -> Vec<Handler> {
        let Some(entry) = self.entries.get_mut(name) else {
            return Vec::new();
        };
        let mut handlers = entry.persistent.clone();
        handlers.append(&mut entry.once);
        if entry.is_empty() {
            self.entries.remove(name);
        }
        handlers
    }

    /// Runs every handler for `event.name` and returns how many ran.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if one or more handlers failed. All
    /// handlers still run.
    pub fn dispatch(&mut self, event: &Event) -> Result<usize, DispatchError> {
        let handlers = self.snapshot(&event.name);
        invoke_all(&handlers, event)
    }
}

/// Invokes `handlers` in order, collecting failures instead of stopping.
///
/// # Errors
///
/// Returns [`DispatchError`] carrying every failure when at least one
/// handler returned an error.
pub fn invoke_all(handlers: &[Handler], event: &Event) -> Result<usize, DispatchError> {
    let failures: Vec<anyhow::Error> = handlers
        .iter()
        .filter_map(|h| h.call(event).err())
        .collect();
    if failures.is_empty() {
        Ok(handlers.len())
    } else {
        Err(DispatchError {
            event: event.name.clone(),
            invoked: handlers.len(),
            failures,
        })
    }
}

fn push_unique(list: &mut Vec<Handler>, handler: Handler) -> bool {
    if list.contains(&handler) {
        return false;
    }
    list.push(handler);
    true
}

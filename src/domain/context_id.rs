//! Execution context identity and send targets.
//!
//! [`ContextId`] is a newtype wrapper around [`uuid::Uuid`] (v4) naming one
//! isolated execution context (a page, an embedded frame, a WebSocket peer).
//! [`Target`] is what callers hand to a transport for resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for an execution context.
///
/// Generated once when a transport endpoint is created and immutable
/// thereafter. Used as the destination of outbound payloads and as the
/// reported source of inbound ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(uuid::Uuid);

impl ContextId {
    /// Creates a new random `ContextId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `ContextId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for ContextId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

/// Where an outbound message should go, before transport resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A specific context.
    Context(ContextId),
    /// The embedding context. A top-level context is its own parent.
    Parent,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(ContextId::new(), ContextId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = ContextId::new().to_string();
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let id = ContextId::from_uuid(uuid);
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, format!("\"{uuid}\""));
        assert_eq!(*id.as_uuid(), uuid);
    }
}

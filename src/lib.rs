//! # frame-pool
//!
//! Cross-context publish/subscribe message pool.
//!
//! Two isolated execution contexts (a page and an embedded frame, a server
//! and its WebSocket clients) exchange named, ordered events serialized as
//! JSON arrays. Each context owns a [`pool::MessagePool`] that keeps its
//! handler table, gates inbound traffic on a readiness flag, and logs
//! through a pluggable sink. A [`pool::SyncSession`] pings a peer until it
//! answers, covering the window before the peer becomes ready.
//!
//! ## Architecture
//!
//! ```text
//! Application handlers
//!     │
//!     ├── MessagePool (pool/)  ◄── SyncSession (pool/) + Scheduler
//!     │       │
//!     │       ├── HandlerRegistry, codec, LogSink (domain/)
//!     │       │
//!     │       └── Transport (transport/)
//!     │               ├── LoopbackTransport
//!     │               ├── MemoryHub
//!     │               └── WsTransport (ws/) ◄── Axum bridge (api/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod pool;
pub mod transport;
pub mod ws;

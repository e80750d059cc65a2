//! WebSocket bridge: every connected socket is a remote context of the
//! server's message pool.
//!
//! Clients exchange the same wire format as any other transport: one JSON
//! array per text frame, `["eventName", ...args]`.

pub mod connection;
pub mod handler;
pub mod peers;
pub mod transport;

pub use peers::PeerTable;
pub use transport::WsTransport;

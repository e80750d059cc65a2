//! Pool layer: the message pool, its scheduling primitives, and the
//! ping/pong synchronization session built on top of it.

pub mod message_pool;
pub mod scheduler;
pub mod sync_session;

pub use message_pool::{Delivery, MessagePool, PING_EVENT, PONG_EVENT, PoolBuilder, Received};
pub use scheduler::{ManualScheduler, Scheduler, TaskId, TokioScheduler};
pub use sync_session::{DEFAULT_SYNC_INTERVAL, SessionState, SyncSession};

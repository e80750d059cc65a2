//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::BridgeConfig;
use crate::domain::{LogSink, TracingSink};
use crate::error::PoolError;
use crate::pool::{MessagePool, Scheduler};
use crate::ws::WsTransport;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The server's message pool.
    pub pool: MessagePool,
    /// Bridge transport the pool is bound to.
    pub transport: WsTransport,
    /// Timer source for per-connection sync sessions.
    pub scheduler: Arc<dyn Scheduler>,
    /// Whether each new connection is pinged until it answers.
    pub sync_on_connect: bool,
    /// Retry interval for those pings.
    pub sync_interval: Duration,
}

impl AppState {
    /// Builds the pool from `config`, applies its log exclusions and marks
    /// it ready.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Transport`] if the pool cannot bind to the
    /// bridge transport.
    pub fn from_config(
        config: &BridgeConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, PoolError> {
        Self::with_sink(config, scheduler, Arc::new(TracingSink))
    }

    /// Same as [`Self::from_config`] with an explicit log sink.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Transport`] if the pool cannot bind to the
    /// bridge transport.
    pub fn with_sink(
        config: &BridgeConfig,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, PoolError> {
        let transport = WsTransport::new();
        let pool = MessagePool::builder(config.pool_name.clone())
            .transport(Arc::new(transport.clone()))
            .sink(sink)
            .build();
        pool.exclude_log(false, &config.log_exclude);
        pool.ready(true)?;
        Ok(Self {
            pool,
            transport,
            scheduler,
            sync_on_connect: config.sync_on_connect,
            sync_interval: config.sync_interval,
        })
    }
}

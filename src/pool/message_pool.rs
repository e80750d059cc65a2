//! Named-event message pool bound to one transport endpoint.
//!
//! A [`MessagePool`] owns the handler registry, the readiness flag and the
//! log exclusion list of one execution context. Outbound events are encoded
//! and handed to the transport; inbound payloads are decoded, gated on
//! readiness, logged, and dispatched.
//!
//! ```text
//! send/post ──► encode ──► resolve target ──► Transport::send_raw
//!                                  │
//!                                  └── unresolved ──► log "DROP"
//!
//! Transport callback ──► decode ──► ready? ──no──► log "SKIP"
//!                                     │
//!                                     └─yes─► log (unless excluded) ──► dispatch
//! ```
//!
//! Handlers run without the pool lock held, so they may send, register,
//! or unregister freely, including while a synchronous transport delivers
//! a reply inside `send`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use crate::domain::handler_registry::invoke_all;
use crate::domain::{
    ContextId, Handler, HandlerRegistry, LogSink, Target, TracingSink, codec,
};
use crate::error::PoolError;
use crate::transport::{Inbound, LoopbackTransport, Transport};

/// Control event sent to check whether a peer is listening.
pub const PING_EVENT: &str = "evPing";

/// Control event a ready pool answers every ping with.
pub const PONG_EVENT: &str = "evPong";

const SEEDED_EXCLUSIONS: [&str; 2] = [PING_EVENT, PONG_EVENT];

/// Outcome of [`MessagePool::send`] and [`MessagePool::post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the transport for this destination.
    Sent(ContextId),
    /// No destination could be resolved; the message was logged and dropped.
    Dropped,
}

/// Outcome of [`MessagePool::on_receive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// The pool was not ready; the message was logged and discarded.
    Skipped,
    /// Dispatched to this many handlers.
    Dispatched(usize),
}

#[derive(Debug)]
struct PoolState {
    registry: HandlerRegistry,
    ready: bool,
    bound: bool,
    excluded: Vec<String>,
}

#[derive(Debug)]
struct PoolInner {
    name: String,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn LogSink>,
    state: Mutex<PoolState>,
}

/// Handle to a message pool. Clones share the same pool.
#[derive(Debug, Clone)]
pub struct MessagePool {
    inner: Arc<PoolInner>,
}

/// Builder for [`MessagePool`].
///
/// Defaults to a [`LoopbackTransport`] and a [`TracingSink`].
#[derive(Debug)]
pub struct PoolBuilder {
    name: String,
    transport: Option<Arc<dyn Transport>>,
    sink: Option<Arc<dyn LogSink>>,
}

impl PoolBuilder {
    /// Sets the transport endpoint.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the log sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the pool and installs the built-in ping responder.
    #[must_use]
    pub fn build(self) -> MessagePool {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(LoopbackTransport::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let inner = Arc::new(PoolInner {
            name: self.name,
            transport,
            sink,
            state: Mutex::new(PoolState {
                registry: HandlerRegistry::new(),
                ready: false,
                bound: false,
                excluded: SEEDED_EXCLUSIONS.iter().map(|s| (*s).to_string()).collect(),
            }),
        });
        let pool = MessagePool { inner };
        pool.register(PING_EVENT, ping_responder(Arc::downgrade(&pool.inner)));
        pool
    }
}

/// Answers a ping with a pong to whoever sent it.
fn ping_responder(pool: Weak<PoolInner>) -> Handler {
    Handler::new(move |event| {
        let Some(inner) = pool.upgrade() else {
            return Ok(());
        };
        let pool = MessagePool { inner };
        match event.source {
            Some(source) => pool.send(Some(source), PONG_EVENT, &[])?,
            None => pool.post(PONG_EVENT, &[])?,
        };
        Ok(())
    })
}

impl MessagePool {
    /// Starts building a pool named `name`; the name prefixes every log line.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PoolBuilder {
        PoolBuilder {
            name: name.into(),
            transport: None,
            sink: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pool name used in log lines.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Context id of the underlying transport endpoint.
    #[must_use]
    pub fn local_id(&self) -> ContextId {
        self.inner.transport.local_id()
    }

    /// Whether inbound messages are currently dispatched.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    /// Returns `true` if any persistent or once handler exists for `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.lock().registry.has(name)
    }

    /// Registers a persistent handler. Returns `false` if it was already
    /// registered for `name`.
    pub fn register(&self, name: &str, handler: Handler) -> bool {
        self.lock().registry.register(name, handler)
    }

    /// Registers a handler for the next dispatch of `name` only.
    pub fn register_once(&self, name: &str, handler: Handler) -> bool {
        self.lock().registry.register_once(name, handler)
    }

    /// Removes one handler, or every handler for `name` when `handler` is
    /// `None`. Returns whether anything was removed.
    pub fn unregister(&self, name: &str, handler: Option<&Handler>) -> bool {
        self.lock().registry.unregister(name, handler)
    }

    /// Sends an event to `target`.
    ///
    /// A `None` target, or one the transport cannot resolve, is logged with
    /// the `DROP` prefix and yields [`Delivery::Dropped`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Codec`] if the event cannot be encoded.
    pub fn send(
        &self,
        target: Option<ContextId>,
        name: &str,
        args: &[Value],
    ) -> Result<Delivery, PoolError> {
        self.route(target.map(Target::Context), name, args)
    }

    /// Sends an event to the parent context (itself when top-level).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Codec`] if the event cannot be encoded.
    pub fn post(&self, name: &str, args: &[Value]) -> Result<Delivery, PoolError> {
        self.route(Some(Target::Parent), name, args)
    }

    fn route(
        &self,
        target: Option<Target>,
        name: &str,
        args: &[Value],
    ) -> Result<Delivery, PoolError> {
        let payload = codec::encode(name, args)?;
        let transport = &self.inner.transport;
        match target.and_then(|t| transport.resolve(t)) {
            Some(destination) => {
                transport.send_raw(destination, payload);
                Ok(Delivery::Sent(destination))
            }
            None => {
                self.write("DROP ", name, args);
                Ok(Delivery::Dropped)
            }
        }
    }

    /// Processes one inbound payload.
    ///
    /// Bound to the transport by [`Self::ready`]; callable directly to feed
    /// payloads from elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Codec`] for a malformed payload (after logging
    /// it with the `ERROR` prefix), or [`PoolError::Dispatch`] if a handler
    /// failed. Other handlers still ran.
    pub fn on_receive(&self, inbound: Inbound) -> Result<Received, PoolError> {
        let mut event = match codec::decode(&inbound.payload) {
            Ok(event) => event,
            Err(err) => {
                self.inner.sink.log(
                    &format!("[{}]: ERROR malformed payload :", self.inner.name),
                    &[Value::String(inbound.payload), Value::String(err.to_string())],
                );
                return Err(err.into());
            }
        };
        event.source = inbound.source;

        let (handlers, excluded) = {
            let mut state = self.lock();
            if !state.ready {
                drop(state);
                self.write("SKIP ", &event.name, &event.args);
                return Ok(Received::Skipped);
            }
            let excluded = state.excluded.contains(&event.name);
            (state.registry.snapshot(&event.name), excluded)
        };
        if !excluded {
            self.write("", &event.name, &event.args);
        }
        Ok(Received::Dispatched(invoke_all(&handlers, &event)?))
    }

    /// Sets the readiness flag.
    ///
    /// The first time it becomes `true` the pool binds itself to the
    /// transport's receive event; the binding is never undone. Setting it
    /// back to `false` only stops dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Transport`] if binding fails; the flag is left
    /// unchanged in that case.
    pub fn ready(&self, flag: bool) -> Result<(), PoolError> {
        let mut state = self.lock();
        if flag && !state.bound {
            let pool = Arc::downgrade(&self.inner);
            self.inner.transport.bind(Arc::new(move |inbound: Inbound| {
                let Some(inner) = pool.upgrade() else {
                    return;
                };
                let pool = MessagePool { inner };
                if let Err(err) = pool.on_receive(inbound) {
                    tracing::warn!(pool = %pool.name(), error = %err, "inbound message failed");
                }
            }))?;
            state.bound = true;
            tracing::debug!(pool = %self.inner.name, "pool bound to transport");
        }
        state.ready = flag;
        Ok(())
    }

    /// Updates the set of event names that are received without logging.
    ///
    /// With `reset`, the list first returns to the two control events. Each
    /// name is then added once.
    pub fn exclude_log<I, S>(&self, reset: bool, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.lock();
        if reset {
            state.excluded = SEEDED_EXCLUSIONS.iter().map(|s| (*s).to_string()).collect();
        }
        for name in names {
            let name = name.as_ref();
            if !state.excluded.iter().any(|n| n == name) {
                state.excluded.push(name.to_string());
            }
        }
    }

    /// Current log exclusion list, in insertion order.
    #[must_use]
    pub fn excluded_events(&self) -> Vec<String> {
        self.lock().excluded.clone()
    }

    /// Writes an ad hoc diagnostic line prefixed with the pool name.
    pub fn log(&self, args: &[Value]) {
        self.inner.sink.log(&format!("[{}]:", self.inner.name), args);
    }

    fn write(&self, prefix: &str, name: &str, args: &[Value]) {
        self.inner
            .sink
            .log(&format!("[{}]: {prefix}{name} :", self.inner.name), args);
    }
}

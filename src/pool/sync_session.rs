//! Ping/pong handshake establishing that a peer pool is listening.
//!
//! A peer drops (and logs as `SKIP`) anything that arrives before it calls
//! `ready(true)`, so a single ping may be lost during startup. The session
//! re-sends the ping every interval until a pong arrives or it is
//! cancelled.
//!
//! ```text
//!               pong received
//! AwaitingPong ───────────────► Resolved   (timer cleared, callback runs once)
//!      │  ▲
//!      │  └── timer: send ping, re-arm
//!      │
//!      └──── cancel() ────────► Cancelled  (timer cleared, no callback)
//! ```
//!
//! The pong handler is a once handler on the owning pool, so the pool must
//! be ready for the pong to be dispatched. Pongs from a context other than
//! the session's target are ignored, so several sessions can share a pool.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use super::message_pool::{Delivery, MessagePool, PING_EVENT, PONG_EVENT};
use super::scheduler::{Scheduler, TaskId};
use crate::domain::{ContextId, Handler};

/// Retry interval between pings.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(1000);

/// Lifecycle of a [`SyncSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Pinging; no pong seen yet.
    AwaitingPong,
    /// Pong received and callback invoked.
    Resolved,
    /// Cancelled before a pong arrived.
    Cancelled,
}

type Completion = Box<dyn FnOnce() + Send + 'static>;

struct Progress {
    state: SessionState,
    timer: Option<TaskId>,
    pings_sent: usize,
    on_synced: Option<Completion>,
    /// Thread currently inside `on_sync`'s send, if any.
    sending_on: Option<ThreadId>,
}

struct SessionInner {
    pool: MessagePool,
    target: Option<ContextId>,
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
    pong_handler: Handler,
    progress: Mutex<Progress>,
    /// Held by `on_sync` from its state check through the ping send, and by
    /// every terminal transition, so no ping leaves after the session ends.
    send_gate: Mutex<()>,
}

/// Handle to a running or finished handshake. Clones share the session.
#[derive(Clone)]
pub struct SyncSession {
    inner: Arc<SessionInner>,
}

impl SyncSession {
    /// Starts a handshake with `target` using [`DEFAULT_SYNC_INTERVAL`].
    ///
    /// The first ping is sent before this returns.
    pub fn start<F>(
        pool: &MessagePool,
        target: Option<ContextId>,
        scheduler: Arc<dyn Scheduler>,
        on_synced: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::start_with_interval(pool, target, scheduler, DEFAULT_SYNC_INTERVAL, on_synced)
    }

    /// Starts a handshake retrying every `interval`.
    pub fn start_with_interval<F>(
        pool: &MessagePool,
        target: Option<ContextId>,
        scheduler: Arc<dyn Scheduler>,
        interval: Duration,
        on_synced: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &Weak<SessionInner>| {
            let session = Weak::clone(weak);
            SessionInner {
                pool: pool.clone(),
                target,
                scheduler,
                interval,
                pong_handler: Handler::from_fn(move |event| {
                    if let Some(inner) = session.upgrade() {
                        inner.on_pong(event.source);
                    }
                }),
                progress: Mutex::new(Progress {
                    state: SessionState::AwaitingPong,
                    timer: None,
                    pings_sent: 0,
                    on_synced: Some(Box::new(on_synced)),
                    sending_on: None,
                }),
                send_gate: Mutex::new(()),
            }
        });
        inner
            .pool
            .register_once(PONG_EVENT, inner.pong_handler.clone());
        inner.on_sync();
        Self { inner }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Number of pings sent so far.
    #[must_use]
    pub fn pings_sent(&self) -> usize {
        self.inner.lock().pings_sent
    }

    /// Stops the handshake. Returns `false` if the session had already
    /// resolved or been cancelled.
    pub fn cancel(&self) -> bool {
        let _gate = self.inner.enter_gate();
        let timer = {
            let mut progress = self.inner.lock();
            if progress.state != SessionState::AwaitingPong {
                return false;
            }
            progress.state = SessionState::Cancelled;
            progress.on_synced = None;
            progress.timer.take()
        };
        if let Some(timer) = timer {
            self.inner.scheduler.cancel(timer);
        }
        self.inner
            .pool
            .unregister(PONG_EVENT, Some(&self.inner.pong_handler));
        tracing::debug!(pool = %self.inner.pool.name(), "sync session cancelled");
        true
    }
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the send gate, unless this thread already holds it
    /// because a synchronous transport re-entered from inside `on_sync`.
    fn enter_gate(&self) -> Option<MutexGuard<'_, ()>> {
        if self.lock().sending_on == Some(thread::current().id()) {
            return None;
        }
        Some(self.send_gate.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn on_sync(self: &Arc<Self>) {
        let _gate = self.send_gate.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut progress = self.lock();
            if progress.state != SessionState::AwaitingPong {
                return;
            }
            progress.timer = None;
            progress.pings_sent += 1;
            progress.sending_on = Some(thread::current().id());
        }

        // A synchronous transport may resolve the session inside this call.
        match self.pool.send(self.target, PING_EVENT, &[]) {
            Ok(Delivery::Sent(_)) => {}
            Ok(Delivery::Dropped) => {
                tracing::debug!(pool = %self.pool.name(), "sync ping dropped: no target");
            }
            Err(err) => {
                tracing::warn!(pool = %self.pool.name(), error = %err, "sync ping failed");
            }
        }

        let mut progress = self.lock();
        progress.sending_on = None;
        if progress.state == SessionState::AwaitingPong {
            let session = Arc::clone(self);
            progress.timer = Some(
                self.scheduler
                    .schedule(self.interval, Box::new(move || session.on_sync())),
            );
        }
    }

    fn on_pong(&self, source: Option<ContextId>) {
        let gate = self.enter_gate();
        let (timer, on_synced) = {
            let mut progress = self.lock();
            if progress.state != SessionState::AwaitingPong {
                return;
            }
            if let (Some(target), Some(source)) = (self.target, source)
                && target != source
            {
                // Someone else's pong; wait for the next one.
                drop(progress);
                self.pool.register_once(PONG_EVENT, self.pong_handler.clone());
                return;
            }
            progress.state = SessionState::Resolved;
            (progress.timer.take(), progress.on_synced.take())
        };
        if let Some(timer) = timer {
            self.scheduler.cancel(timer);
        }
        drop(gate);
        tracing::debug!(pool = %self.pool.name(), "sync session resolved");
        if let Some(on_synced) = on_synced {
            on_synced();
        }
    }
}

impl fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = self.inner.lock();
        f.debug_struct("SyncSession")
            .field("pool", &self.inner.pool.name())
            .field("target", &self.inner.target)
            .field("state", &progress.state)
            .field("pings_sent", &progress.pings_sent)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;

    use super::*;
    use crate::domain::{MemorySink, Target};
    use crate::error::TransportError;
    use crate::pool::ManualScheduler;
    use crate::transport::{MemoryHub, MemoryTransport, ReceiveCallback, Transport};

    /// Parks inside the second `send_raw` until released.
    #[derive(Debug)]
    struct ParkingTransport {
        id: ContextId,
        sends: AtomicUsize,
        in_flight: AtomicBool,
        parked: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Transport for ParkingTransport {
        fn local_id(&self) -> ContextId {
            self.id
        }

        fn resolve(&self, target: Target) -> Option<ContextId> {
            match target {
                Target::Context(id) => Some(id),
                Target::Parent => Some(self.id),
            }
        }

        fn send_raw(&self, _destination: ContextId, _payload: String) {
            if self.sends.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                self.in_flight.store(true, Ordering::SeqCst);
                let _ = self.parked.lock().map(|tx| tx.send(()));
                let _ = self.release.lock().map(|rx| rx.recv());
                self.in_flight.store(false, Ordering::SeqCst);
            }
        }

        fn bind(&self, _callback: ReceiveCallback) -> Result<(), TransportError> {
            Ok(())
        }
    }

    const PING_WIRE: &str = r#"["evPing"]"#;

    fn pool_on(name: &str, transport: &MemoryTransport) -> MessagePool {
        MessagePool::builder(name)
            .transport(Arc::new(transport.clone()))
            .sink(Arc::new(MemorySink::new()))
            .build()
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        (hits, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn silent_target_is_pinged_every_interval_until_cancelled() {
        let hub = MemoryHub::new();
        let page_t = hub.top_level();
        let frame_t = hub.embedded(page_t.local_id());
        let page = pool_on("page", &page_t);
        let _ = page.ready(true);
        let sched = ManualScheduler::new();
        let (hits, on_synced) = counter();

        let session = SyncSession::start(
            &page,
            Some(frame_t.local_id()),
            Arc::new(sched.clone()),
            on_synced,
        );
        let _ = sched.advance(DEFAULT_SYNC_INTERVAL);
        let _ = sched.advance(DEFAULT_SYNC_INTERVAL);
        let _ = hub.pump();

        assert_eq!(hub.sent_to(frame_t.local_id()).len(), 3);
        assert_eq!(session.pings_sent(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), SessionState::AwaitingPong);

        assert!(session.cancel());
        assert!(!session.cancel());
        assert_eq!(sched.pending(), 0);
        let _ = sched.advance(DEFAULT_SYNC_INTERVAL * 5);
        assert_eq!(hub.sent_to(frame_t.local_id()).len(), 3);
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(!page.has(PONG_EVENT));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn responsive_target_resolves_after_one_ping() {
        let hub = MemoryHub::new();
        let page_t = hub.top_level();
        let frame_t = hub.embedded(page_t.local_id());
        let page = pool_on("page", &page_t);
        let frame = pool_on("frame", &frame_t);
        let _ = page.ready(true);
        let _ = frame.ready(true);
        let sched = ManualScheduler::new();
        let (hits, on_synced) = counter();

        let session = SyncSession::start(
            &page,
            Some(frame.local_id()),
            Arc::new(sched.clone()),
            on_synced,
        );
        let _ = hub.pump();

        assert_eq!(session.state(), SessionState::Resolved);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sched.pending(), 0);
        assert_eq!(sched.advance(DEFAULT_SYNC_INTERVAL * 3), 0);
        assert_eq!(hub.sent_to(frame.local_id()), vec![PING_WIRE.to_string()]);
        assert!(!session.cancel());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_ready_peer_is_reached_by_a_retry() {
        let hub = MemoryHub::new();
        let page_t = hub.top_level();
        let frame_t = hub.embedded(page_t.local_id());
        let page = pool_on("page", &page_t);
        let frame = pool_on("frame", &frame_t);
        let _ = page.ready(true);
        let sched = ManualScheduler::new();
        let (hits, on_synced) = counter();

        // Frame is bound but not ready: the first ping is skipped.
        let _ = frame.ready(true);
        let _ = frame.ready(false);
        let session = SyncSession::start(
            &page,
            Some(frame.local_id()),
            Arc::new(sched.clone()),
            on_synced,
        );
        let _ = hub.pump();
        assert_eq!(session.state(), SessionState::AwaitingPong);

        let _ = frame.ready(true);
        let _ = sched.advance(DEFAULT_SYNC_INTERVAL);
        let _ = hub.pump();

        assert_eq!(session.state(), SessionState::Resolved);
        assert_eq!(session.pings_sent(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn pong_from_another_context_is_ignored() {
        let hub = MemoryHub::new();
        let page_t = hub.top_level();
        let slow_t = hub.embedded(page_t.local_id());
        let fast_t = hub.embedded(page_t.local_id());
        let page = pool_on("page", &page_t);
        let fast = pool_on("fast", &fast_t);
        let _ = page.ready(true);
        let _ = fast.ready(true);
        let sched = ManualScheduler::new();
        let (slow_hits, slow_done) = counter();
        let (fast_hits, fast_done) = counter();

        let slow = SyncSession::start(
            &page,
            Some(slow_t.local_id()),
            Arc::new(sched.clone()),
            slow_done,
        );
        let quick = SyncSession::start(
            &page,
            Some(fast.local_id()),
            Arc::new(sched.clone()),
            fast_done,
        );
        let _ = hub.pump();

        assert_eq!(quick.state(), SessionState::Resolved);
        assert_eq!(fast_hits.load(Ordering::SeqCst), 1);
        assert_eq!(slow.state(), SessionState::AwaitingPong);
        assert_eq!(slow_hits.load(Ordering::SeqCst), 0);
        assert!(page.has(PONG_EVENT));

        assert!(slow.cancel());
        assert!(!page.has(PONG_EVENT));
    }

    #[test]
    fn cancel_waits_for_in_flight_retry_and_stops_pings() {
        let (parked_tx, parked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let transport = Arc::new(ParkingTransport {
            id: ContextId::new(),
            sends: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            parked: Mutex::new(parked_tx),
            release: Mutex::new(release_rx),
        });
        let pool = MessagePool::builder("page")
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .sink(Arc::new(MemorySink::new()))
            .build();
        let sched = ManualScheduler::new();
        let (hits, on_synced) = counter();
        let session = SyncSession::start(
            &pool,
            Some(ContextId::new()),
            Arc::new(sched.clone()),
            on_synced,
        );

        // The retry parks inside its send on another thread.
        let ticker = {
            let sched = sched.clone();
            thread::spawn(move || sched.advance(DEFAULT_SYNC_INTERVAL))
        };
        assert!(parked_rx.recv_timeout(Duration::from_secs(5)).is_ok());

        let canceller = {
            let session = session.clone();
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                let cancelled = session.cancel();
                (cancelled, transport.in_flight.load(Ordering::SeqCst))
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!canceller.is_finished());
        let _ = release_tx.send(());

        let Ok((cancelled, in_flight)) = canceller.join() else {
            panic!("cancel thread panicked");
        };
        assert!(cancelled);
        assert!(!in_flight);
        assert_eq!(ticker.join().ok(), Some(1));
        assert_eq!(session.state(), SessionState::Cancelled);
        assert_eq!(sched.pending(), 0);

        assert_eq!(sched.advance(DEFAULT_SYNC_INTERVAL * 3), 0);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 2);
        assert_eq!(session.pings_sent(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn loopback_resolves_inside_start() {
        let pool = MessagePool::builder("solo")
            .sink(Arc::new(MemorySink::new()))
            .build();
        let _ = pool.ready(true);
        let sched = ManualScheduler::new();
        let (hits, on_synced) = counter();

        let session = SyncSession::start(
            &pool,
            Some(pool.local_id()),
            Arc::new(sched.clone()),
            on_synced,
        );
        assert_eq!(session.state(), SessionState::Resolved);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn missing_target_keeps_retrying() {
        let pool = MessagePool::builder("solo")
            .sink(Arc::new(MemorySink::new()))
            .build();
        let sched = ManualScheduler::new();
        let (_, on_synced) = counter();

        let session = SyncSession::start_with_interval(
            &pool,
            None,
            Arc::new(sched.clone()),
            Duration::from_millis(250),
            on_synced,
        );
        assert_eq!(sched.advance(Duration::from_secs(1)), 4);
        assert_eq!(session.pings_sent(), 5);
        assert!(session.cancel());
    }
}

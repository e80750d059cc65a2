//! Schedule-after and cancel-task primitives.
//!
//! [`TokioScheduler`] runs tasks on a Tokio runtime after a real delay.
//! [`ManualScheduler`] keeps a virtual clock that only moves when
//! [`ManualScheduler::advance`] is called, which makes retry timing
//! deterministic under test.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::AbortHandle;

/// Identifies a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Schedules `task` to run once after `delay`.
    fn schedule(&self, delay: Duration, task: Task) -> TaskId;

    /// Cancels a pending task. Returns `false` if it already ran or was
    /// already cancelled.
    fn cancel(&self, id: TaskId) -> bool;
}

/// Real-time scheduler backed by Tokio tasks.
#[derive(Debug)]
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<TaskId, AbortHandle>>>,
}

impl TokioScheduler {
    /// Creates a scheduler spawning onto `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a scheduler on the runtime of the calling task.
    ///
    /// # Errors
    ///
    /// Returns [`TryCurrentError`] when called outside a Tokio runtime.
    pub fn current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<TaskId, AbortHandle>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pending = Arc::clone(&self.pending);
        // Hold the map while spawning so the task cannot look itself up
        // before its abort handle is recorded.
        let mut map = self.lock_pending();
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let due = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id)
                .is_some();
            if due {
                task();
            }
        });
        map.insert(id, join.abort_handle());
        id
    }

    fn cancel(&self, id: TaskId) -> bool {
        match self.lock_pending().remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, TaskId), Task>,
    deadlines: HashMap<TaskId, Duration>,
}

/// Virtual-clock scheduler.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    /// Creates a scheduler whose clock starts at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Moves the clock forward by `by`, running every task that falls due
    /// in deadline order, including tasks scheduled by those tasks. Returns
    /// how many ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        let mut ran = 0;
        loop {
            let task = {
                let mut state = self.lock();
                let due = state
                    .queue
                    .first_key_value()
                    .is_some_and(|((deadline, _), _)| *deadline <= target);
                if !due {
                    state.now = target;
                    break;
                }
                let Some(((deadline, id), task)) = state.queue.pop_first() else {
                    break;
                };
                state.deadlines.remove(&id);
                state.now = deadline;
                task
            };
            task();
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskId {
        let mut state = self.lock();
        let id = TaskId(state.next_id);
        state.next_id += 1;
        let deadline = state.now.saturating_add(delay);
        state.queue.insert((deadline, id), task);
        state.deadlines.insert(id, deadline);
        id
    }

    fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.lock();
        match state.deadlines.remove(&id) {
            Some(deadline) => state.queue.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter_task(hits: &Arc<AtomicUsize>) -> Task {
        let hits = Arc::clone(hits);
        Box::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn manual_runs_only_due_tasks() {
        let sched = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _ = sched.schedule(Duration::from_millis(100), counter_task(&hits));
        let _ = sched.schedule(Duration::from_millis(300), counter_task(&hits));

        assert_eq!(sched.advance(Duration::from_millis(99)), 0);
        assert_eq!(sched.advance(Duration::from_millis(1)), 1);
        assert_eq!(sched.now(), Duration::from_millis(100));
        assert_eq!(sched.pending(), 1);
        assert_eq!(sched.advance(Duration::from_millis(500)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(sched.now(), Duration::from_millis(600));
    }

    #[test]
    fn manual_cancel_prevents_run() {
        let sched = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = sched.schedule(Duration::from_millis(10), counter_task(&hits));
        assert!(sched.cancel(id));
        assert!(!sched.cancel(id));
        assert_eq!(sched.advance(Duration::from_secs(1)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn manual_runs_tasks_scheduled_by_tasks() {
        let sched = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner_sched = sched.clone();
        let inner_hits = Arc::clone(&hits);
        let _ = sched.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = inner_sched.schedule(Duration::from_millis(10), counter_task(&inner_hits));
            }),
        );
        assert_eq!(sched.advance(Duration::from_millis(25)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_runs_after_delay() {
        let Ok(sched) = TokioScheduler::current() else {
            return;
        };
        let hits = Arc::new(AtomicUsize::new(0));
        let _ = sched.schedule(Duration::from_millis(50), counter_task(&hits));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_cancel_aborts() {
        let Ok(sched) = TokioScheduler::current() else {
            return;
        };
        let hits = Arc::new(AtomicUsize::new(0));
        let id = sched.schedule(Duration::from_millis(50), counter_task(&hits));
        assert!(sched.cancel(id));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!sched.cancel(id));
    }
}

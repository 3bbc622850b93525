//! The task scheduler: submission, dispatch, cancellation, and lifecycle
//! event delivery.
//!
//! All bookkeeping lives behind one mutex, so every public operation is
//! atomic from the caller's perspective; in particular a cancellation can
//! never race a dispatch decision. Work futures run on a [`WorkerPool`]
//! sized to the concurrency limit, and completions feed back into an
//! iterative dispatch loop.

use super::events::{EventKind, ListenerId, ListenerRegistry, SchedulerEvent};
use super::queue::PendingQueue;
use super::task::{BoxWork, Outcome, Stats, TaskId, TaskRecord, TaskStatus};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{panic_message, WorkerPool};
use crate::telemetry::{Metrics, MetricsSnapshot};
use futures::Future;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Priority-ordered, concurrency-limited scheduler for asynchronous tasks.
///
/// Work is any `Future<Output = Result<T>>`; it stays inert until the
/// dispatcher selects it, runs to completion on a worker thread, and its
/// outcome is retained for inspection. Handles are cheap to clone and share
/// one scheduler core, so a task may submit follow-up work through a clone.
///
/// # Example
///
/// ```no_run
/// use sluice_rs::TaskScheduler;
///
/// let scheduler: TaskScheduler<u32> = TaskScheduler::with_concurrency(2).unwrap();
/// let id = scheduler.submit(async { Ok(40 + 2) });
/// let value = futures::executor::block_on(scheduler.result(id)).unwrap();
/// assert_eq!(value, 42);
/// ```
pub struct TaskScheduler<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TaskScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    concurrency: usize,
    pool: WorkerPool,
    metrics: Metrics,
    next_task_id: AtomicU64,
    /// Handed to worker jobs so a dropped scheduler tears down cleanly
    /// instead of keeping itself alive through in-flight work.
    weak_self: Weak<Inner<T>>,
    state: Mutex<SchedState<T>>,
}

struct SchedState<T> {
    tasks: HashMap<TaskId, TaskRecord<T>>,
    queue: PendingQueue,
    next_seq: u64,
    pending: usize,
    running: usize,
    paused: bool,
    /// Latch so `QueueEmpty` fires once per busy-to-idle transition.
    idle_emitted: bool,
    idle_waiters: Vec<async_channel::Sender<()>>,
    listeners: ListenerRegistry<T>,
}

impl<T: Clone + Send + 'static> TaskScheduler<T> {
    /// Scheduler with the default configuration (`concurrency = 1`).
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Scheduler running up to `concurrency` tasks simultaneously.
    pub fn with_concurrency(concurrency: usize) -> Result<Self> {
        Self::with_config(Config::builder().concurrency(concurrency).build()?)
    }

    /// Scheduler from an explicit [`Config`].
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(&config)?;

        Ok(Self {
            inner: Arc::new_cyclic(|weak| Inner {
                concurrency: config.concurrency,
                pool,
                metrics: Metrics::new(),
                next_task_id: AtomicU64::new(1),
                weak_self: weak.clone(),
                state: Mutex::new(SchedState {
                    tasks: HashMap::new(),
                    queue: PendingQueue::new(),
                    next_seq: 0,
                    pending: 0,
                    running: 0,
                    paused: false,
                    idle_emitted: true,
                    idle_waiters: Vec::new(),
                    listeners: ListenerRegistry::new(),
                }),
            }),
        })
    }

    /// Submit work at the default priority (0).
    ///
    /// Returns immediately with the task's id; the work runs once a
    /// concurrency slot is free.
    pub fn submit<F>(&self, work: F) -> TaskId
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        self.submit_with_priority(work, 0)
    }

    /// Submit work with an explicit priority.
    ///
    /// Higher priorities dispatch earlier; among equal priorities tasks
    /// start in submission order.
    pub fn submit_with_priority<F>(&self, work: F, priority: i32) -> TaskId
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let id = TaskId(self.inner.next_task_id.fetch_add(1, Ordering::Relaxed));

        {
            let mut state = self.inner.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state
                .tasks
                .insert(id, TaskRecord::new(priority, seq, Box::pin(work)));
            state.queue.push(id, priority, seq);
            state.pending += 1;
            state.idle_emitted = false;
        }

        self.inner.metrics.record_submitted();
        self.inner.dispatch();
        id
    }

    /// Current lifecycle state of a task, or `None` for an unknown id.
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.inner
            .state
            .lock()
            .tasks
            .get(&id)
            .map(|record| record.status)
    }

    /// Await a task's terminal outcome.
    ///
    /// Resolves immediately for an already-terminal task. A failed task
    /// yields [`Error::TaskFailed`], a cancelled one [`Error::Cancelled`],
    /// an unknown id [`Error::UnknownTask`], and [`Error::Shutdown`] if the
    /// scheduler is dropped first. Any number of callers may await the same
    /// task; all observe the same outcome.
    pub async fn result(&self, id: TaskId) -> Result<T> {
        let receiver = {
            let mut state = self.inner.state.lock();
            let Some(record) = state.tasks.get_mut(&id) else {
                return Err(Error::UnknownTask(id));
            };

            if record.status == TaskStatus::Cancelled {
                return Err(Error::Cancelled(id));
            }
            match &record.outcome {
                Some(Outcome::Completed(value)) => return Ok(value.clone()),
                Some(Outcome::Failed(msg)) => return Err(Error::TaskFailed(msg.clone())),
                None => {
                    let (tx, rx) = async_channel::bounded(1);
                    record.waiters.push(tx);
                    rx
                }
            }
        };

        receiver.recv().await.map_err(|_| Error::Shutdown)?
    }

    /// Cancel a pending task.
    ///
    /// Returns `true` and marks the task `Cancelled` only if it has not
    /// started; running, terminal, and unknown tasks are left untouched and
    /// yield `false`.
    pub fn cancel(&self, id: TaskId) -> bool {
        {
            let mut state = self.inner.state.lock();
            let Some(record) = state.tasks.get_mut(&id) else {
                return false;
            };
            if record.status != TaskStatus::Pending {
                return false;
            }

            record.status = TaskStatus::Cancelled;
            record.work = None;
            for tx in record.waiters.drain(..) {
                let _ = tx.try_send(Err(Error::Cancelled(id)));
            }
            state.pending -= 1;
        }

        self.inner.metrics.record_cancelled(1);
        self.inner.notify_if_idle();
        true
    }

    /// Cancel every pending task; running tasks are unaffected.
    ///
    /// Returns the number of tasks cancelled.
    pub fn cancel_all(&self) -> usize {
        let cancelled = {
            let mut state = self.inner.state.lock();
            let ids: Vec<TaskId> = state
                .tasks
                .iter()
                .filter(|(_, record)| record.status == TaskStatus::Pending)
                .map(|(id, _)| *id)
                .collect();

            for id in &ids {
                if let Some(record) = state.tasks.get_mut(id) {
                    record.status = TaskStatus::Cancelled;
                    record.work = None;
                    for tx in record.waiters.drain(..) {
                        let _ = tx.try_send(Err(Error::Cancelled(*id)));
                    }
                }
            }
            state.pending -= ids.len();
            ids.len()
        };

        if cancelled > 0 {
            self.inner.metrics.record_cancelled(cancelled as u64);
            self.inner.notify_if_idle();
        }
        cancelled
    }

    /// Stop dispatching new tasks. Running tasks continue to completion.
    pub fn pause(&self) {
        self.inner.state.lock().paused = true;
    }

    /// Resume dispatch and immediately fill any free slots.
    pub fn resume(&self) {
        self.inner.state.lock().paused = false;
        self.inner.dispatch();
    }

    /// Register a listener for one event kind.
    ///
    /// Listeners for a kind fire in registration order, outside the
    /// scheduler lock, so a callback may call back into the scheduler.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SchedulerEvent<T>) + Send + Sync + 'static,
    {
        self.inner
            .state
            .lock()
            .listeners
            .on(kind, Arc::new(callback))
    }

    /// Remove a listener registered with [`on`](Self::on).
    ///
    /// Returns `false` if the handle is unknown for that event kind.
    pub fn off(&self, kind: EventKind, listener: ListenerId) -> bool {
        self.inner.state.lock().listeners.off(kind, listener)
    }

    /// Point-in-time counts of tasks per lifecycle state.
    pub fn stats(&self) -> Stats {
        let state = self.inner.state.lock();
        let mut stats = Stats::default();
        for record in state.tasks.values() {
            match record.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Resolve once no task is pending or running.
    ///
    /// Observes the live queue: tasks submitted while waiting extend the
    /// wait. Resolves immediately on an idle scheduler, and successfully
    /// regardless of individual task failures.
    pub async fn wait_for_all(&self) {
        let receiver = {
            let mut state = self.inner.state.lock();
            if state.pending == 0 && state.running == 0 {
                return;
            }
            let (tx, rx) = async_channel::bounded(1);
            state.idle_waiters.push(tx);
            rx
        };

        let _ = receiver.recv().await;
    }

    /// Lifetime counters for this scheduler instance.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// The configured concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }
}

impl<T: Clone + Send + 'static> Inner<T> {
    /// One dispatch attempt: fill free slots from the pending queue.
    ///
    /// Runs as an explicit loop under the state lock; launched work is
    /// handed to the pool only after the lock is released, so a work future
    /// can never observe a half-updated scheduler.
    fn dispatch(&self) {
        let mut launched: Vec<(TaskId, BoxWork<T>)> = Vec::new();

        {
            let mut state = self.state.lock();
            if state.paused {
                return;
            }

            while state.running < self.concurrency && !state.queue.is_empty() {
                let Some(entry) = state.queue.pop() else {
                    break;
                };
                let work = {
                    let Some(record) = state.tasks.get_mut(&entry.id) else {
                        continue;
                    };
                    // Lazily dropped queue entry for a cancelled task.
                    if record.status != TaskStatus::Pending {
                        continue;
                    }
                    record.status = TaskStatus::Running;
                    record.work.take()
                };
                let Some(work) = work else {
                    continue;
                };

                state.pending -= 1;
                state.running += 1;
                self.metrics.record_running(state.running);
                launched.push((entry.id, work));
            }
        }

        for (id, work) in launched {
            let weak = self.weak_self.clone();
            self.pool.execute(Box::new(move || {
                let (outcome, panicked) = run_work(work);
                if let Some(inner) = weak.upgrade() {
                    inner.complete(id, outcome, panicked);
                }
            }));
        }
    }

    /// Terminal transition of a task that ran: record the outcome, release
    /// waiters, emit the lifecycle event, refill the freed slot, and notify
    /// if the scheduler drained.
    fn complete(&self, id: TaskId, outcome: Outcome<T>, panicked: bool) {
        let (event, callbacks) = {
            let mut state = self.state.lock();
            let Some(record) = state.tasks.get_mut(&id) else {
                return;
            };

            let event = match &outcome {
                Outcome::Completed(value) => SchedulerEvent::TaskComplete {
                    id,
                    result: value.clone(),
                },
                Outcome::Failed(msg) => SchedulerEvent::TaskError {
                    id,
                    error: msg.clone(),
                },
            };

            record.status = match &outcome {
                Outcome::Completed(_) => TaskStatus::Completed,
                Outcome::Failed(_) => TaskStatus::Failed,
            };
            for tx in record.waiters.drain(..) {
                let _ = tx.try_send(match &outcome {
                    Outcome::Completed(value) => Ok(value.clone()),
                    Outcome::Failed(msg) => Err(Error::TaskFailed(msg.clone())),
                });
            }
            record.outcome = Some(outcome);
            state.running -= 1;

            let callbacks = state.listeners.snapshot(event.kind());
            (event, callbacks)
        };

        match &event {
            SchedulerEvent::TaskComplete { .. } => self.metrics.record_completed(),
            _ => self.metrics.record_failed(),
        }
        if panicked {
            self.metrics.record_panicked();
        }

        for callback in &callbacks {
            callback(&event);
        }

        self.dispatch();
        self.notify_if_idle();
    }

    /// Release drain waiters and emit `QueueEmpty` on a busy-to-idle edge.
    fn notify_if_idle(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            if state.pending != 0 || state.running != 0 || state.idle_emitted {
                return;
            }
            state.idle_emitted = true;
            for tx in state.idle_waiters.drain(..) {
                let _ = tx.try_send(());
            }
            state.listeners.snapshot(EventKind::QueueEmpty)
        };

        let event = SchedulerEvent::QueueEmpty;
        for callback in &callbacks {
            callback(&event);
        }
    }
}

/// Drive one work future to completion, converting errors and panics into
/// a recorded outcome. Returns the outcome and whether it came from a panic.
fn run_work<T>(work: BoxWork<T>) -> (Outcome<T>, bool) {
    match catch_unwind(AssertUnwindSafe(|| futures::executor::block_on(work))) {
        Ok(Ok(value)) => (Outcome::Completed(value), false),
        Ok(Err(e)) => {
            // Keep an already-bare failure message bare instead of
            // re-wrapping it at every surface.
            let msg = match e {
                Error::TaskFailed(msg) => msg,
                other => other.to_string(),
            };
            (Outcome::Failed(msg), false)
        }
        Err(payload) => (Outcome::Failed(panic_message(payload)), true),
    }
}

impl<T> fmt::Debug for TaskScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TaskScheduler")
            .field("concurrency", &self.inner.concurrency)
            .field("pending", &state.pending)
            .field("running", &state.running)
            .field("paused", &state.paused)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_submit_returns_unique_ids() {
        let scheduler: TaskScheduler<i32> = TaskScheduler::new().unwrap();
        scheduler.pause();

        let a = scheduler.submit(async { Ok(1) });
        let b = scheduler.submit(async { Ok(2) });
        assert_ne!(a, b);
    }

    #[test]
    fn test_submit_and_await() {
        let scheduler: TaskScheduler<&'static str> = TaskScheduler::new().unwrap();
        let id = scheduler.submit(async { Ok("done") });

        assert_eq!(block_on(scheduler.result(id)).unwrap(), "done");
        assert_eq!(scheduler.status(id), Some(TaskStatus::Completed));
    }

    #[test]
    fn test_unknown_id_policy() {
        let scheduler: TaskScheduler<i32> = TaskScheduler::new().unwrap();
        let bogus = TaskId(999);

        assert_eq!(scheduler.status(bogus), None);
        assert!(!scheduler.cancel(bogus));
        assert!(matches!(
            block_on(scheduler.result(bogus)),
            Err(Error::UnknownTask(_))
        ));
    }

    #[test]
    fn test_wait_for_all_on_idle_scheduler() {
        let scheduler: TaskScheduler<i32> = TaskScheduler::new().unwrap();
        block_on(scheduler.wait_for_all());
    }
}

//! Task identity, lifecycle states, and per-task bookkeeping.

use crate::error::Result;
use futures::Future;
use std::fmt;
use std::pin::Pin;

/// Boxed work future as stored between submission and dispatch.
pub(crate) type BoxWork<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

/// Unique identifier for a submitted task.
///
/// Ids are allocated from a monotonic counter owned by the scheduler
/// instance and are never reused for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle state of a task.
///
/// Transitions are one-directional: `Pending -> Running -> {Completed |
/// Failed}`, or `Pending -> Cancelled`. The three right-hand states are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// True for `Completed`, `Failed`, and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Point-in-time task counts per lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Terminal outcome of a task that ran.
///
/// Holding result and error in one enum keeps the "exactly one of the two"
/// invariant by construction. Cancelled tasks never get an `Outcome`.
#[derive(Debug, Clone)]
pub(crate) enum Outcome<T> {
    Completed(T),
    Failed(String),
}

pub(crate) struct TaskRecord<T> {
    pub(crate) status: TaskStatus,
    pub(crate) priority: i32,
    pub(crate) seq: u64,
    /// Taken at dispatch; `None` once running or cancelled.
    pub(crate) work: Option<BoxWork<T>>,
    pub(crate) outcome: Option<Outcome<T>>,
    /// One-shot senders registered by `result()` callers awaiting the
    /// terminal transition.
    pub(crate) waiters: Vec<async_channel::Sender<Result<T>>>,
}

impl<T> TaskRecord<T> {
    pub(crate) fn new(priority: i32, seq: u64, work: BoxWork<T>) -> Self {
        Self {
            status: TaskStatus::Pending,
            priority,
            seq,
            work: Some(work),
            outcome: None,
            waiters: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for TaskRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("status", &self.status)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("waiters", &self.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskId(7).to_string(), "task-7");
        assert_eq!(TaskStatus::Running.to_string(), "running");
    }
}

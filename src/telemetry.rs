//! Scheduler metrics collection.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Lifetime counters for one scheduler instance.
///
/// All counters are monotonic; `peak_running` is a high-water mark recorded
/// at dispatch time.
#[derive(Debug)]
pub(crate) struct Metrics {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_cancelled: AtomicU64,
    tasks_panicked: AtomicU64,
    peak_running: AtomicUsize,
    start_time: Instant,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_cancelled: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            peak_running: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self, count: u64) {
        self.tasks_cancelled.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_running(&self, running: usize) {
        self.peak_running.fetch_max(running, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            peak_running: self.peak_running.load(Ordering::Relaxed),
        }
    }
}

/// Owned view of the counters at one point in time.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    /// Time since the scheduler was constructed.
    pub uptime: Duration,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_cancelled: u64,
    /// Failed tasks whose work panicked rather than returning an error.
    pub tasks_panicked: u64,
    /// Highest simultaneous running-task count observed.
    pub peak_running: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_completed();
        metrics.record_failed();
        metrics.record_cancelled(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.tasks_submitted, 2);
        assert_eq!(snap.tasks_completed, 1);
        assert_eq!(snap.tasks_failed, 1);
        assert_eq!(snap.tasks_cancelled, 3);
    }

    #[test]
    fn test_peak_running_is_high_water() {
        let metrics = Metrics::new();

        metrics.record_running(2);
        metrics.record_running(5);
        metrics.record_running(1);

        assert_eq!(metrics.snapshot().peak_running, 5);
    }
}

//! Runtime-independent delay future.
//!
//! One lazily-started timer thread owns a heap of deadlines and wakes
//! registered futures as they come due. Used by tests and demos to give
//! work futures a controllable duration; the scheduler itself never
//! depends on wall-clock time.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::{Duration, Instant};

/// Completes once `duration` has elapsed.
pub fn delay(duration: Duration) -> Delay {
    Delay::new(duration)
}

/// Future returned by [`delay`].
#[derive(Debug)]
pub struct Delay {
    deadline: Instant,
    state: Arc<DelayState>,
    registered: bool,
}

#[derive(Debug)]
struct DelayState {
    fired: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl Delay {
    /// Create a delay expiring `duration` from now.
    pub fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            state: Arc::new(DelayState {
                fired: AtomicBool::new(false),
                waker: Mutex::new(None),
            }),
            registered: false,
        }
    }

    /// The instant this delay expires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Future for Delay {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if Instant::now() >= self.deadline {
            return Poll::Ready(());
        }

        // Publish the waker before re-checking `fired`: if the timer fires
        // between the store and the check, the check catches it; if it
        // fires afterwards, the timer thread sees this waker.
        *self.state.waker.lock() = Some(cx.waker().clone());

        if self.state.fired.load(Ordering::Acquire) {
            return Poll::Ready(());
        }

        if !self.registered {
            self.registered = true;
            timer().register(self.deadline, Arc::clone(&self.state));
        }

        Poll::Pending
    }
}

struct TimerEntry {
    deadline: Instant,
    state: Arc<DelayState>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Earliest deadline first out of the max-heap.
        other.deadline.cmp(&self.deadline)
    }
}

struct Timer {
    queue: Mutex<BinaryHeap<TimerEntry>>,
    condvar: Condvar,
}

impl Timer {
    fn register(&self, deadline: Instant, state: Arc<DelayState>) {
        self.queue.lock().push(TimerEntry { deadline, state });
        self.condvar.notify_one();
    }

    fn run(&self) {
        let mut queue = self.queue.lock();
        loop {
            let now = Instant::now();

            while let Some(head) = queue.peek_mut() {
                if head.deadline > now {
                    break;
                }
                let entry = std::collections::binary_heap::PeekMut::pop(head);
                entry.state.fired.store(true, Ordering::Release);
                let waker = entry.state.waker.lock().take();
                if let Some(waker) = waker {
                    waker.wake();
                }
            }

            match queue.peek().map(|entry| entry.deadline) {
                Some(next) => {
                    let _ = self.condvar.wait_until(&mut queue, next);
                }
                None => {
                    self.condvar.wait(&mut queue);
                }
            }
        }
    }
}

fn timer() -> &'static Timer {
    static TIMER: OnceLock<&'static Timer> = OnceLock::new();
    *TIMER.get_or_init(|| {
        let timer: &'static Timer = Box::leak(Box::new(Timer {
            queue: Mutex::new(BinaryHeap::new()),
            condvar: Condvar::new(),
        }));
        thread::Builder::new()
            .name("sluice-timer".to_string())
            .spawn(move || timer.run())
            .expect("failed to spawn timer thread");
        timer
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_delay_elapses() {
        let start = Instant::now();
        block_on(delay(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_zero_delay_is_immediate() {
        block_on(delay(Duration::ZERO));
    }

    #[test]
    fn test_concurrent_delays() {
        let start = Instant::now();
        block_on(async {
            futures::join!(
                delay(Duration::from_millis(40)),
                delay(Duration::from_millis(20)),
                delay(Duration::from_millis(30)),
            );
        });

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(40));
        // Joined, not sequential.
        assert!(elapsed < Duration::from_millis(90));
    }
}

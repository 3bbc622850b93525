use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_deque::{Injector, Steal};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed pool of worker threads draining a shared injector queue.
///
/// The pool is sized to the scheduler's concurrency limit: the dispatcher
/// never has more jobs in flight than there are workers, so a submitted job
/// always finds a free thread. Each job occupies its worker until the work
/// future it drives resolves.
pub(crate) struct WorkerPool {
    injector: Arc<Injector<Job>>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<WorkerHandle>,
    num_threads: usize,
}

struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
    unparker: thread::Thread,
}

impl WorkerPool {
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let num_threads = config.concurrency;
        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(num_threads);
        for id in 0..num_threads {
            let injector_clone = Arc::clone(&injector);
            let shutdown_clone = Arc::clone(&shutdown);
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let thread = builder
                .spawn(move || worker_loop(injector_clone, shutdown_clone))
                .map_err(|e| Error::executor(format!("spawn failed: {e}")))?;

            let unparker = thread.thread().clone();
            workers.push(WorkerHandle {
                thread: Some(thread),
                unparker,
            });
        }

        Ok(Self {
            injector,
            shutdown,
            workers,
            num_threads,
        })
    }

    pub(crate) fn execute(&self, job: Job) {
        self.injector.push(job);
        for worker in &self.workers {
            worker.unparker.unpark();
        }
    }

    pub(crate) fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        // wake everyone up to check the shutdown flag
        for worker in &self.workers {
            worker.unparker.unpark();
        }

        // A worker dropping the last scheduler handle runs this from inside
        // its own loop; it must not join itself.
        let current = thread::current().id();
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.thread().id() == current {
                    continue;
                }
                let _ = thread.join();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("queued", &self.injector.len())
            .finish()
    }
}

fn worker_loop(injector: Arc<Injector<Job>>, shutdown: Arc<AtomicBool>) {
    let mut backoff_cnt = 0u32;

    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        match injector.steal() {
            Steal::Success(job) => {
                backoff_cnt = 0;
                run_job(job);
            }
            Steal::Retry => continue,
            Steal::Empty => backoff(&mut backoff_cnt),
        }
    }
}

fn run_job(job: Job) {
    // Work futures are already caught inside the job; this guards the
    // worker loop against bookkeeping panics.
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        eprintln!(
            "sluice: job panicked on {}",
            thread::current().name().unwrap_or("worker")
        );
    }
}

fn backoff(count: &mut u32) {
    const MAX_SPINS: u32 = 10;
    const MAX_YIELDS: u32 = 20;

    *count += 1;

    if *count <= MAX_SPINS {
        let spins = (*count).min(6);
        for _ in 0..(1 << spins) {
            std::hint::spin_loop();
        }
    } else if *count <= MAX_YIELDS {
        thread::yield_now();
    } else {
        thread::park_timeout(Duration::from_micros(100));
    }
}

/// Panic payload to a displayable message.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! SLUICE - priority-gated async task scheduling
//!
//! An in-process job scheduler for Rust: submit asynchronous units of work,
//! let the scheduler run up to N of them concurrently in priority order,
//! and observe each task's lifecycle through status queries, result
//! futures, and events.
//!
//! # Quick Start
//!
//! ```no_run
//! use sluice_rs::prelude::*;
//! use std::time::Duration;
//!
//! let scheduler: TaskScheduler<String> = TaskScheduler::with_concurrency(2).unwrap();
//!
//! // Submit work; futures stay inert until dispatched.
//! let id = scheduler.submit(async {
//!     delay(Duration::from_millis(50)).await;
//!     Ok("done".to_string())
//! });
//!
//! // Urgent work overtakes the pending queue.
//! scheduler.submit_with_priority(async { Ok("urgent".to_string()) }, 10);
//!
//! let outcome = block_on(scheduler.result(id)).unwrap();
//! assert_eq!(outcome, "done");
//! ```
//!
//! # Features
//!
//! - **Bounded Concurrency**: at most `concurrency` tasks run at once
//! - **Priority Dispatch**: higher priority starts first, FIFO among equals
//! - **Cancellation**: pending tasks can be cancelled before they start
//! - **Pause/Resume**: gate dispatch without touching running tasks
//! - **Lifecycle Events**: task completion, task failure, queue drained
//! - **Failure Isolation**: a failing or panicking task never affects others
//! - **Drain Waiting**: `wait_for_all` resolves when the live queue empties

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod scheduler;
pub mod telemetry;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use scheduler::{
    EventKind, ListenerId, SchedulerEvent, Stats, TaskId, TaskScheduler, TaskStatus,
};
pub use telemetry::MetricsSnapshot;
pub use util::{delay, Delay};

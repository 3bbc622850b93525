//! Work execution infrastructure.
//!
//! The scheduler decides *which* task runs next; this module owns the
//! threads that actually drive the work futures.

pub mod pool;

pub(crate) use pool::{panic_message, WorkerPool};

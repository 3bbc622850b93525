//! One-stop imports for scheduler users.

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::scheduler::{
    EventKind, ListenerId, SchedulerEvent, Stats, TaskId, TaskScheduler, TaskStatus,
};
pub use crate::telemetry::MetricsSnapshot;
pub use crate::util::{delay, Delay};

pub use futures::executor::block_on;

//! Small support utilities.

pub mod delay;

pub use delay::{delay, Delay};

//! Capture slot scheduling.
//!
//! This crate decides when the next still should be taken:
//! - [`SlotPlanner`] computes grid-aligned capture slots inside a daily work window
//! - [`wait_until`] sleeps toward a slot in adaptive increments while staying
//!   responsive to shutdown

mod error;
mod slots;
mod wait;

pub use error::ScheduleError;
pub use slots::{ReopenPolicy, SlotPlanner, WorkWindow};
pub use wait::{WaitOutcome, wait_until};

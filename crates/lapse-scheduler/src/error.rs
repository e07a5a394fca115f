//! Error types for slot planning.

use thiserror::Error;

/// Errors that can occur when building a slot plan.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Work-window hours out of range or inverted.
    #[error("invalid work window: start {start}h, end {end}h (need 0 <= start < end < 24)")]
    InvalidWindow { start: u32, end: u32 },

    /// Capture interval must be positive.
    #[error("invalid capture interval: {0} minutes")]
    InvalidInterval(i64),
}

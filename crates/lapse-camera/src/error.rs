//! Error types for still capture.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while capturing a still.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The capture program could not be started.
    #[error("failed to start capture program {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O toward the capture process failed.
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The capture program exited unsuccessfully.
    #[error("capture program exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// The capture program did not finish in time and was killed.
    #[error("capture timed out after {0:?}")]
    TimedOut(Duration),

    /// The capture program exited cleanly but produced no image data.
    #[error("capture produced no image data")]
    EmptyImage,
}

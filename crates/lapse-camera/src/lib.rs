//! Camera capability for still capture.
//!
//! The daemon never talks to camera hardware directly; it holds a [`Camera`]
//! and asks it for one complete frame at a time. [`CommandCamera`] is the
//! production implementation, driving an external still-capture program.

mod command;
mod error;

use async_trait::async_trait;

pub use command::{CaptureSettings, CommandCamera, MAX_RESOLUTION};
pub use error::CameraError;

/// Timestamp format burned into each frame (e.g. `2024-Mar-05 07:30AM`).
pub const ANNOTATION_FORMAT: &str = "%Y-%b-%d %I:%M%p";

/// A device that can produce one complete still image.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Capture a single frame and return its encoded bytes.
    ///
    /// May block for the implementation's warm-up before exposing.
    async fn capture(&self) -> Result<Vec<u8>, CameraError>;
}

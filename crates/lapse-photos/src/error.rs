//! Error types for the photo library client.

use thiserror::Error;

/// Errors that can occur when talking to the photo library service.
#[derive(Debug, Error)]
pub enum PhotosError {
    /// Credential material missing or unusable.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing stored credentials failed.
    #[error("credential storage error at {path}: {source}")]
    TokenStorage {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Album creation was rejected by the service.
    #[error("could not create album {title}: {message}")]
    AlbumCreate { title: String, message: String },
}

/// Failure modes of the two-phase media upload.
///
/// Any of these sends the capture cycle to its local fallback write.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Phase 1 (raw byte upload) did not yield an upload token.
    #[error("failed to obtain upload token: {0}")]
    Token(String),

    /// Phase 2 rejected the media item.
    #[error("library rejected {file_name}: {message} (code {code})")]
    Rejected {
        file_name: String,
        code: i64,
        message: String,
    },

    /// Phase 2 returned no confirmation for the media item.
    #[error("media item not confirmed: {0}")]
    Unconfirmed(String),

    /// Transport or auth failure below the protocol.
    #[error(transparent)]
    Transport(#[from] PhotosError),
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(PhotosError::Http(e))
    }
}

//! Photo library capability: albums and media upload.
//!
//! [`PhotosClient`] speaks the Google Photos Library API; [`TokenStore`]
//! owns the OAuth material it authenticates with. The [`PhotoStore`] trait
//! is the seam the capture cycle depends on, so tests can substitute a fake
//! library.

mod auth;
mod client;
mod error;
mod types;

use std::collections::HashMap;

use async_trait::async_trait;

pub use auth::{StoredTokens, TokenStore};
pub use client::{LIBRARY_API, PhotosClient};
pub use error::{PhotosError, UploadError};
pub use types::Album;

/// Album and media-upload operations the capture cycle depends on.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Mapping of album titles to ids, covering the whole library.
    async fn list_albums(&self) -> Result<HashMap<String, String>, PhotosError>;

    /// Create an album with the given title and return its id.
    async fn create_album(&self, title: &str) -> Result<String, PhotosError>;

    /// Upload one media item, optionally into an album. The item is either
    /// confirmed created or the error says why.
    async fn upload(
        &self,
        album_id: Option<&str>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), UploadError>;
}

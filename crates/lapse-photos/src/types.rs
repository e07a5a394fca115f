//! Wire types for the photo library API.

use serde::{Deserialize, Serialize};

/// One album as listed by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// One page of the album listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAlbumsResponse {
    /// Absent when the library has no albums.
    #[serde(default)]
    pub albums: Vec<Album>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAlbumRequest<'a> {
    pub album: NewAlbum<'a>,
}

#[derive(Debug, Serialize)]
pub struct NewAlbum<'a> {
    pub title: &'a str,
}

/// Response from album creation; `id` is absent on rejection.
#[derive(Debug, Deserialize)]
pub struct CreateAlbumResponse {
    pub id: Option<String>,
}

/// Phase 2 of the media upload: create items from upload tokens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<&'a str>,
    pub new_media_items: Vec<NewMediaItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItem<'a> {
    pub description: &'a str,
    pub simple_media_item: SimpleMediaItem<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMediaItem<'a> {
    pub file_name: &'a str,
    pub upload_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResponse {
    pub new_media_item_results: Option<Vec<NewMediaItemResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItemResult {
    #[serde(default)]
    pub status: MediaStatus,
    pub media_item: Option<MediaItem>,
}

/// Per-item status inside a batch-create response. A positive `code` is a
/// rejection.
#[derive(Debug, Default, Deserialize)]
pub struct MediaStatus {
    pub code: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
}

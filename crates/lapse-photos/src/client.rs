//! Photo library API client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::auth::TokenStore;
use crate::types::{
    BatchCreateRequest, BatchCreateResponse, CreateAlbumRequest, CreateAlbumResponse,
    ListAlbumsResponse, NewAlbum, NewMediaItem, SimpleMediaItem,
};
use crate::{PhotoStore, PhotosError, UploadError};

/// Production endpoint of the photo library service.
pub const LIBRARY_API: &str = "https://photoslibrary.googleapis.com/v1";

/// Page size requested from the album listing endpoint.
const ALBUM_PAGE_SIZE: u32 = 50;

/// Client for the photo library service.
///
/// Every outbound call obtains its bearer token from the owned
/// [`TokenStore`] first, so requests never go out with a stale credential.
pub struct PhotosClient {
    http: Client,
    base_url: String,
    tokens: TokenStore,
}

impl PhotosClient {
    /// Client against the production endpoint.
    pub fn new(tokens: TokenStore) -> Self {
        Self::with_base_url(tokens, LIBRARY_API)
    }

    /// Client against a non-default endpoint.
    pub fn with_base_url(tokens: TokenStore, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    /// Map of album titles to ids, following pagination to cover the whole
    /// library.
    pub async fn list_albums(&self) -> Result<HashMap<String, String>, PhotosError> {
        let mut titles = HashMap::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.tokens.ensure_valid().await?;
            let mut request = self
                .http
                .get(format!("{}/albums", self.base_url))
                .header("Authorization", format!("Bearer {}", token))
                .query(&[("pageSize", ALBUM_PAGE_SIZE.to_string())]);
            if let Some(ref next) = page_token {
                request = request.query(&[("pageToken", next.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(Self::api_error(response).await);
            }

            let page: ListAlbumsResponse = response.json().await?;
            for album in page.albums {
                titles.insert(album.title, album.id);
            }

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!(count = titles.len(), "listed albums");
        Ok(titles)
    }

    /// Create an album and return its id.
    pub async fn create_album(&self, title: &str) -> Result<String, PhotosError> {
        let token = self.tokens.ensure_valid().await?;
        let response = self
            .http
            .post(format!("{}/albums", self.base_url))
            .header("Authorization", format!("Bearer {}", token))
            .json(&CreateAlbumRequest {
                album: NewAlbum { title },
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            error!(title, %status, message, "could not create album");
            return Err(PhotosError::AlbumCreate {
                title: title.to_string(),
                message: format!("({}) {}", status, message),
            });
        }

        let created: CreateAlbumResponse = response.json().await?;
        match created.id {
            Some(id) => {
                info!(title, id = %id, "created new album");
                Ok(id)
            }
            None => Err(PhotosError::AlbumCreate {
                title: title.to_string(),
                message: "response carried no album id".to_string(),
            }),
        }
    }

    /// Upload one media item: raw bytes first for an upload token, then a
    /// batch-create call referencing it. Confirmed created or a typed
    /// [`UploadError`].
    pub async fn upload(
        &self,
        album_id: Option<&str>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), UploadError> {
        info!(file_name, bytes = bytes.len(), "uploading");

        let upload_token = self.obtain_upload_token(file_name, bytes).await?;

        let token = self
            .tokens
            .ensure_valid()
            .await
            .map_err(UploadError::Transport)?;
        let request = BatchCreateRequest {
            album_id,
            new_media_items: vec![NewMediaItem {
                description: "",
                simple_media_item: SimpleMediaItem {
                    file_name,
                    upload_token: &upload_token,
                },
            }],
        };

        let response = self
            .http
            .post(format!("{}/mediaItems:batchCreate", self.base_url))
            .header("Authorization", format!("Bearer {}", token))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::Transport(PhotosError::Api {
                status,
                message,
            }));
        }

        let body: BatchCreateResponse = response.json().await?;
        let Some(results) = body.new_media_item_results else {
            return Err(UploadError::Unconfirmed(
                "response carried no media item results".to_string(),
            ));
        };
        let Some(result) = results.first() else {
            return Err(UploadError::Unconfirmed(
                "empty media item results".to_string(),
            ));
        };

        let code = result.status.code.unwrap_or(0);
        if code > 0 {
            let message = result
                .status
                .message
                .clone()
                .unwrap_or_else(|| "unspecified".to_string());
            error!(file_name, code, message, "library rejected upload");
            return Err(UploadError::Rejected {
                file_name: file_name.to_string(),
                code,
                message,
            });
        }

        let media_id = result.media_item.as_ref().map(|item| item.id.as_str());
        info!(file_name, media_id, "added to library");
        Ok(())
    }

    async fn obtain_upload_token(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let token = self
            .tokens
            .ensure_valid()
            .await
            .map_err(UploadError::Transport)?;

        // Raw frames run to several megabytes; give the byte upload more
        // room than the default request timeout.
        let response = self
            .http
            .post(format!("{}/uploads", self.base_url))
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-type", "application/octet-stream")
            .header("X-Goog-Upload-Protocol", "raw")
            .header("X-Goog-Upload-File-Name", file_name)
            .timeout(Duration::from_secs(120))
            .body(bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(UploadError::Token(format!("({}) {}", status, text)));
        }

        let upload_token = response.text().await?;
        if upload_token.is_empty() {
            return Err(UploadError::Token("empty upload token".to_string()));
        }
        Ok(upload_token)
    }

    async fn api_error(response: reqwest::Response) -> PhotosError {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        PhotosError::Api { status, message }
    }
}

#[async_trait]
impl PhotoStore for PhotosClient {
    async fn list_albums(&self) -> Result<HashMap<String, String>, PhotosError> {
        PhotosClient::list_albums(self).await
    }

    async fn create_album(&self, title: &str) -> Result<String, PhotosError> {
        PhotosClient::create_album(self, title).await
    }

    async fn upload(
        &self,
        album_id: Option<&str>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), UploadError> {
        PhotosClient::upload(self, album_id, file_name, bytes).await
    }
}

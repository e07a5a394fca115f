//! OAuth token management for the photo library client.
//!
//! Refresh is an explicit step: every outbound call asks the store for a
//! currently-valid access token via [`TokenStore::ensure_valid`] rather than
//! relying on refresh-on-access side effects. Token material granted during
//! initial authorization is read from a cache file next to the client
//! secret and written back whenever it rotates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::PhotosError;

/// Name of the token cache kept next to the client secret.
const TOKEN_FILE: &str = "auth.json";

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The `installed` section of an OAuth client secret file.
#[derive(Debug, Clone, Deserialize)]
struct InstalledSecret {
    client_id: String,
    client_secret: String,
    token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: InstalledSecret,
}

/// Token material persisted to the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// When `access_token` stops being accepted.
    pub expiry: DateTime<Utc>,
}

impl StoredTokens {
    fn is_fresh(&self) -> bool {
        self.expiry - Utc::now() > chrono::Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Wire response of a `refresh_token` grant.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    /// The provider may rotate the refresh token.
    refresh_token: Option<String>,
}

/// Holds OAuth credentials and keeps the access token valid.
#[derive(Debug)]
pub struct TokenStore {
    http: Client,
    secret: InstalledSecret,
    token_path: PathBuf,
    tokens: RwLock<StoredTokens>,
}

impl TokenStore {
    /// Load the client secret at `secret_path` and the token cache next to
    /// it.
    ///
    /// Tokens must have been granted beforehand; a missing cache file is a
    /// fatal configuration error naming the expected path.
    pub async fn load(secret_path: &Path) -> Result<Self, PhotosError> {
        let raw = fs::read(secret_path)
            .await
            .map_err(|source| PhotosError::TokenStorage {
                path: secret_path.to_path_buf(),
                source,
            })?;
        let secret: ClientSecretFile = serde_json::from_slice(&raw)?;

        let token_path = secret_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(TOKEN_FILE);
        let raw_tokens =
            fs::read(&token_path)
                .await
                .map_err(|source| PhotosError::TokenStorage {
                    path: token_path.clone(),
                    source,
                })?;
        let tokens: StoredTokens = serde_json::from_slice(&raw_tokens)?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        info!(path = %token_path.display(), "loaded stored credentials");

        Ok(Self {
            http,
            secret: secret.installed,
            token_path,
            tokens: RwLock::new(tokens),
        })
    }

    /// A currently-valid bearer token, refreshing first when the cached one
    /// is at or past its expiry margin.
    pub async fn ensure_valid(&self) -> Result<String, PhotosError> {
        {
            let tokens = self.tokens.read().await;
            if tokens.is_fresh() {
                return Ok(tokens.access_token.clone());
            }
        }
        self.refresh().await
    }

    /// Exchange the refresh token for a new access token and persist the
    /// rotated material.
    pub async fn refresh(&self) -> Result<String, PhotosError> {
        let mut tokens = self.tokens.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if tokens.is_fresh() {
            return Ok(tokens.access_token.clone());
        }

        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("refresh_token", tokens.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PhotosError::Auth(format!(
                "token refresh failed ({}): {}",
                status, text
            )));
        }

        let refreshed: RefreshResponse = response.json().await?;
        tokens.access_token = refreshed.access_token;
        tokens.expiry = Utc::now() + chrono::Duration::seconds(refreshed.expires_in);
        if let Some(rotated) = refreshed.refresh_token {
            tokens.refresh_token = rotated;
        }
        self.persist(&tokens).await?;
        debug!(expiry = %tokens.expiry, "refreshed access token");

        Ok(tokens.access_token.clone())
    }

    async fn persist(&self, tokens: &StoredTokens) -> Result<(), PhotosError> {
        let body = serde_json::to_vec_pretty(tokens)?;
        fs::write(&self.token_path, body)
            .await
            .map_err(|source| PhotosError::TokenStorage {
                path: self.token_path.clone(),
                source,
            })
    }
}

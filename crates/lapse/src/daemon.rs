//! Daemon wiring and the capture loop.
//!
//! Startup resolves the album target and constructs the camera and planner;
//! the loop then runs one cycle per slot, strictly sequentially: capture,
//! upload attempt, possible fallback, wait for the next slot. A ctrl-c
//! handler feeds the shutdown channel the wait listens on.

use std::path::PathBuf;
use std::time::Duration;

use miette::Result;
use tokio::sync::watch;
use tracing::info;

use lapse_camera::{ANNOTATION_FORMAT, CaptureSettings, CommandCamera};
use lapse_photos::{PhotoStore, PhotosClient, PhotosError, TokenStore};
use lapse_scheduler::{ReopenPolicy, SlotPlanner, WaitOutcome, WorkWindow, wait_until};

use crate::cycle;

/// Configuration for the daemon.
pub struct DaemonConfig {
    /// Minutes between captures inside the work window.
    pub elapse_minutes: i64,
    /// Path to the API client secret; the token cache lives next to it.
    pub secret: PathBuf,
    /// Album to upload into; `None` targets the general library.
    pub album: Option<String>,
    pub start_hour: u32,
    pub end_hour: u32,
    /// Where frames go when the upload fails.
    pub photos_dir: PathBuf,
    /// Wait for today's window opening instead of skipping to tomorrow when
    /// started before it.
    pub same_day_start: bool,
    pub camera_command: String,
    pub width: u32,
    pub height: u32,
    pub warmup: Duration,
    pub capture_timeout: Duration,
}

/// Run the capture loop until shutdown.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let window = WorkWindow::new(config.start_hour, config.end_hour)
        .map_err(|e| miette::miette!("{}", e))?;
    let reopen = if config.same_day_start {
        ReopenPolicy::SameDay
    } else {
        ReopenPolicy::NextDay
    };
    let planner = SlotPlanner::new(window, config.elapse_minutes, reopen)
        .map_err(|e| miette::miette!("{}", e))?;

    let tokens = TokenStore::load(&config.secret)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    let store = PhotosClient::new(tokens);

    // The loop never starts without a resolved album target when one was
    // requested.
    let album_id = resolve_album(&store, config.album.as_deref())
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    let settings =
        CaptureSettings::still_command(&config.camera_command, config.width, config.height)
            .with_warmup(config.warmup)
            .with_timeout(config.capture_timeout);
    let camera = CommandCamera::new(settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    info!(
        interval_min = config.elapse_minutes,
        album = ?album_id,
        "starting capture loop"
    );

    loop {
        cycle::run_cycle(&camera, &store, album_id.as_deref(), &config.photos_dir)
            .await
            .map_err(|e| miette::miette!("{}", e))?;

        let next = planner.next_slot(chrono::Local::now().naive_local());
        info!(next = %next.format(ANNOTATION_FORMAT), "next capture scheduled");

        if wait_until(next, shutdown_rx.clone()).await == WaitOutcome::Cancelled {
            info!("capture loop stopped");
            return Ok(());
        }
    }
}

/// Resolve a configured album name to an id, creating the album when it does
/// not exist yet. No name (or an empty one) means the general library.
pub async fn resolve_album<S>(store: &S, name: Option<&str>) -> Result<Option<String>, PhotosError>
where
    S: PhotoStore + ?Sized,
{
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    let albums = store.list_albums().await?;
    match albums.get(name) {
        Some(id) => {
            info!(album = name, id = %id, "using existing album");
            Ok(Some(id.clone()))
        }
        None => {
            let id = store.create_album(name).await?;
            Ok(Some(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use lapse_photos::UploadError;

    #[derive(Default)]
    struct FakeStore {
        albums: HashMap<String, String>,
        fail_listing: bool,
        created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PhotoStore for FakeStore {
        async fn list_albums(&self) -> Result<HashMap<String, String>, PhotosError> {
            if self.fail_listing {
                return Err(PhotosError::Auth("token rejected".to_string()));
            }
            Ok(self.albums.clone())
        }

        async fn create_album(&self, title: &str) -> Result<String, PhotosError> {
            self.created.lock().unwrap().push(title.to_string());
            Ok(format!("created-{title}"))
        }

        async fn upload(
            &self,
            _album_id: Option<&str>,
            _file_name: &str,
            _bytes: &[u8],
        ) -> Result<(), UploadError> {
            unimplemented!("album resolution never uploads")
        }
    }

    #[tokio::test]
    async fn existing_album_is_reused() {
        let store = FakeStore {
            albums: HashMap::from([("Trips".to_string(), "id1".to_string())]),
            ..FakeStore::default()
        };

        let resolved = resolve_album(&store, Some("Trips")).await.unwrap();
        assert_eq!(resolved.as_deref(), Some("id1"));
        assert!(store.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_album_is_created_once() {
        let store = FakeStore {
            albums: HashMap::from([("Trips".to_string(), "id1".to_string())]),
            ..FakeStore::default()
        };

        let resolved = resolve_album(&store, Some("NewAlbum")).await.unwrap();
        assert_eq!(resolved.as_deref(), Some("created-NewAlbum"));
        assert_eq!(*store.created.lock().unwrap(), vec!["NewAlbum".to_string()]);
    }

    #[tokio::test]
    async fn no_album_name_targets_general_library() {
        let store = FakeStore {
            fail_listing: true,
            ..FakeStore::default()
        };

        // No listing call happens either; the failing store would surface it.
        assert_eq!(resolve_album(&store, None).await.unwrap(), None);
        assert_eq!(resolve_album(&store, Some("")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn listing_failure_propagates() {
        let store = FakeStore {
            fail_listing: true,
            ..FakeStore::default()
        };

        assert!(matches!(
            resolve_album(&store, Some("Trips")).await,
            Err(PhotosError::Auth(_))
        ));
    }
}

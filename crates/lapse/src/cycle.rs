//! One capture+upload cycle.
//!
//! Each scheduled slot produces exactly one artifact and ensures it is
//! durably recorded: remote upload preferred, local fallback otherwise.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use lapse_camera::{Camera, CameraError};
use lapse_photos::PhotoStore;

/// File name given to each artifact, derived from its capture time
/// (e.g. `2024-Mar-05T07:30AM.jpg`). Used both as the remote display name
/// and the local fallback file name.
pub const FILENAME_FORMAT: &str = "%Y-%b-%dT%I:%M%p.jpg";

/// How a cycle ended; either way the artifact is durably recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The library confirmed the media item.
    Uploaded,
    /// The upload failed and the frame went to the fallback directory.
    SavedLocally,
}

/// Failures that end the cycle (and the process) rather than degrade it.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The camera produced no image; there is nothing to record.
    #[error("capture failed: {0}")]
    Capture(#[from] CameraError),

    /// The last-resort local write failed; no further fallback exists.
    #[error("fallback write to {path} failed: {source}")]
    Fallback {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Artifact file name for a capture taken at `at`.
pub fn file_name_for(at: NaiveDateTime) -> String {
    at.format(FILENAME_FORMAT).to_string()
}

/// Capture one frame and record it.
///
/// Upload failures of any kind degrade to the fallback write; capture and
/// fallback-write failures propagate. There are no retries; the next
/// scheduled cycle is the only retry mechanism and it never revisits this
/// artifact.
pub async fn run_cycle<C, S>(
    camera: &C,
    store: &S,
    album_id: Option<&str>,
    fallback_dir: &Path,
) -> Result<CycleOutcome, CycleError>
where
    C: Camera + ?Sized,
    S: PhotoStore + ?Sized,
{
    let file_name = file_name_for(Local::now().naive_local());

    let frame = camera.capture().await?;

    match store.upload(album_id, &file_name, &frame).await {
        Ok(()) => Ok(CycleOutcome::Uploaded),
        Err(e) => {
            warn!(file_name, error = %e, "upload failed, keeping frame locally");

            let path = fallback_dir.join(&file_name);
            fs::create_dir_all(fallback_dir)
                .await
                .map_err(|source| CycleError::Fallback {
                    path: path.clone(),
                    source,
                })?;
            fs::write(&path, &frame)
                .await
                .map_err(|source| CycleError::Fallback {
                    path: path.clone(),
                    source,
                })?;

            info!(path = %path.display(), "frame saved to fallback directory");
            Ok(CycleOutcome::SavedLocally)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use lapse_photos::{PhotosError, UploadError};

    struct FakeCamera {
        frame: Option<Vec<u8>>,
    }

    #[async_trait]
    impl Camera for FakeCamera {
        async fn capture(&self) -> Result<Vec<u8>, CameraError> {
            match &self.frame {
                Some(frame) => Ok(frame.clone()),
                None => Err(CameraError::EmptyImage),
            }
        }
    }

    #[derive(Default)]
    struct FakeStore {
        reject_uploads: bool,
        uploads: Mutex<Vec<(Option<String>, String, Vec<u8>)>>,
    }

    #[async_trait]
    impl PhotoStore for FakeStore {
        async fn list_albums(&self) -> Result<HashMap<String, String>, PhotosError> {
            Ok(HashMap::new())
        }

        async fn create_album(&self, _title: &str) -> Result<String, PhotosError> {
            unimplemented!("cycle never creates albums")
        }

        async fn upload(
            &self,
            album_id: Option<&str>,
            file_name: &str,
            bytes: &[u8],
        ) -> Result<(), UploadError> {
            if self.reject_uploads {
                return Err(UploadError::Token("connection refused".to_string()));
            }
            self.uploads.lock().unwrap().push((
                album_id.map(str::to_string),
                file_name.to_string(),
                bytes.to_vec(),
            ));
            Ok(())
        }
    }

    #[test]
    fn file_name_uses_twelve_hour_clock() {
        let morning = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        assert_eq!(file_name_for(morning), "2024-Mar-05T07:30AM.jpg");

        let evening = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap();
        assert_eq!(file_name_for(evening), "2024-Mar-05T07:00PM.jpg");
    }

    #[tokio::test]
    async fn successful_upload_leaves_no_local_file() {
        let camera = FakeCamera {
            frame: Some(b"frame-bytes".to_vec()),
        };
        let store = FakeStore::default();
        let dir = tempfile::tempdir().unwrap();

        let outcome = run_cycle(&camera, &store, Some("album-1"), dir.path())
            .await
            .unwrap();
        assert_eq!(outcome, CycleOutcome::Uploaded);

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let (album, file_name, bytes) = &uploads[0];
        assert_eq!(album.as_deref(), Some("album-1"));
        assert!(file_name.ends_with(".jpg"));
        assert_eq!(bytes, b"frame-bytes");

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_upload_writes_frame_to_fallback_dir() {
        let camera = FakeCamera {
            frame: Some(b"frame-bytes".to_vec()),
        };
        let store = FakeStore {
            reject_uploads: true,
            ..FakeStore::default()
        };
        let dir = tempfile::tempdir().unwrap();

        let outcome = run_cycle(&camera, &store, None, dir.path()).await.unwrap();
        assert_eq!(outcome, CycleOutcome::SavedLocally);

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].to_string_lossy().ends_with(".jpg"));
        assert_eq!(std::fs::read(&entries[0]).unwrap(), b"frame-bytes");
    }

    #[tokio::test]
    async fn fallback_dir_is_created_when_missing() {
        let camera = FakeCamera {
            frame: Some(b"frame".to_vec()),
        };
        let store = FakeStore {
            reject_uploads: true,
            ..FakeStore::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("photos");

        let outcome = run_cycle(&camera, &store, None, &nested).await.unwrap();
        assert_eq!(outcome, CycleOutcome::SavedLocally);
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn capture_failure_is_fatal() {
        let camera = FakeCamera { frame: None };
        let store = FakeStore::default();
        let dir = tempfile::tempdir().unwrap();

        let err = run_cycle(&camera, &store, None, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Capture(_)));
        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_fallback_write_is_fatal() {
        let camera = FakeCamera {
            frame: Some(b"frame".to_vec()),
        };
        let store = FakeStore {
            reject_uploads: true,
            ..FakeStore::default()
        };

        // A file where the fallback directory should be.
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("photos");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let err = run_cycle(&camera, &store, None, &blocked).await.unwrap_err();
        assert!(matches!(err, CycleError::Fallback { .. }));
    }
}

//! Flat-file report store.
//!
//! Each report lives at `<root>/report_<id>.json`; screenshots and error notes
//! go under `<root>/screenshots/`. The root doubles as the `/uploads` static
//! directory, so paths recorded in reports are relative to it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::report::{Report, ReportId, ReportRequest};

/// Subdirectory of the store root holding screenshot files.
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// Upper bound on id bumps when several reports are created in the same
/// millisecond.
const MAX_ID_PROBES: u64 = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed report file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no free report id near {0}")]
    IdsExhausted(ReportId),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Handle to the report directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: Arc<PathBuf>,
}

impl ReportStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Create the root and screenshot directories if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub async fn init(&self) -> Result<(), StoreError> {
        let screenshots = self.screenshots_dir();
        tokio::fs::create_dir_all(&screenshots)
            .await
            .map_err(|e| StoreError::io(&screenshots, e))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join(SCREENSHOTS_DIR)
    }

    #[must_use]
    pub fn report_path(&self, id: ReportId) -> PathBuf {
        self.root.join(format!("report_{id}.json"))
    }

    /// Allocate an id derived from `now` and persist the pending report.
    ///
    /// The file is created exclusively, so two requests in the same
    /// millisecond get distinct ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn create_pending(
        &self,
        request: &ReportRequest,
        now: DateTime<Utc>,
    ) -> Result<Report, StoreError> {
        let base = ReportId::from_timestamp(now);
        let mut id = base;

        for _ in 0..MAX_ID_PROBES {
            let path = self.report_path(id);
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match file {
                Ok(file) => {
                    let report = Report::pending(id, request, now);
                    let bytes = match serialize(&path, &report) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            drop(file);
                            discard_reservation(&path).await;
                            return Err(e);
                        }
                    };
                    fill_reservation(file, &path, &bytes).await?;
                    debug!(report_id = %id, path = %path.display(), "Reserved report id");
                    return Ok(report);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => id = id.next(),
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }

        Err(StoreError::IdsExhausted(base))
    }

    /// Write a report, replacing any previous version.
    ///
    /// Writes to a temporary sibling first and renames it into place so
    /// readers never observe a half-written file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub async fn save(&self, report: &Report) -> Result<(), StoreError> {
        let path = self.report_path(report.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serialize(&path, report)?;

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        debug!(
            report_id = %report.id,
            status = report.status.as_str(),
            path = %path.display(),
            "Saved report"
        );
        Ok(())
    }

    /// Load a report, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        let path = self.report_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }
}

fn serialize(path: &Path, report: &Report) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(report).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the first contents of a freshly reserved report file.
///
/// On failure the file is removed again; an empty reservation would make
/// the id permanently unreadable.
async fn fill_reservation<W>(mut file: W, path: &Path, bytes: &[u8]) -> Result<(), StoreError>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    drop(file);

    if let Err(e) = written {
        discard_reservation(path).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

async fn discard_reservation(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove partial report");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CreateReportRequest, ReportStatus};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    /// Writer that fails like a full disk.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no space left on device",
            )))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn request() -> ReportRequest {
        CreateReportRequest {
            channel_url: Some("https://t.me/example".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-02".to_string()),
        }
        .validate(366)
        .unwrap()
    }

    async fn setup() -> (ReportStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path().join("uploads"));
        store.init().await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_init_creates_screenshot_dir() {
        let (store, _dir) = setup().await;
        assert!(store.screenshots_dir().is_dir());
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let (store, _dir) = setup().await;
        assert!(store.load(ReportId::new(123)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_millisecond_gets_distinct_ids() {
        let (store, _dir) = setup().await;
        let now = Utc::now();
        let a = store.create_pending(&request(), now).await.unwrap();
        let b = store.create_pending(&request(), now).await.unwrap();
        assert_eq!(a.id, ReportId::from_timestamp(now));
        assert_eq!(b.id, a.id.next());
        assert_eq!(
            store.load(b.id).await.unwrap().unwrap().status,
            ReportStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_save_replaces_and_leaves_no_temp_file() {
        let (store, _dir) = setup().await;
        let report = store.create_pending(&request(), Utc::now()).await.unwrap();
        let failed = report.fail("boom", Utc::now());
        store.save(&failed).await.unwrap();

        let loaded = store.load(failed.id).await.unwrap().unwrap();
        assert_eq!(loaded, failed);
        assert!(!store.report_path(failed.id).with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let (store, _dir) = setup().await;
        let id = ReportId::new(99);
        tokio::fs::write(store.report_path(id), b"{not json")
            .await
            .unwrap();
        assert!(matches!(
            store.load(id).await,
            Err(StoreError::Json { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_reservation_write_frees_the_id() {
        let (store, _dir) = setup().await;
        let id = ReportId::new(7);
        let path = store.report_path(id);
        tokio::fs::write(&path, b"").await.unwrap();

        let err = fill_reservation(FullDisk, &path, b"{}").await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!path.exists());
        assert!(store.load(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reservation_write_keeps_contents() {
        let (store, _dir) = setup().await;
        let path = store.report_path(ReportId::new(8));
        let file = tokio::fs::File::create(&path).await.unwrap();

        fill_reservation(file, &path, b"{}").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }
}

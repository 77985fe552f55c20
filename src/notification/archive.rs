//! Per-category image archive and its retention sweeper.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::error::NotificationError;
use crate::models::{Category, DetectionEvent};

/// Stores copies of detection images under `<root>/<category>/`.
#[derive(Debug, Clone)]
pub struct ImageArchive {
    root: PathBuf,
}

impl ImageArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies the event's image into the archive and returns the stored path.
    pub async fn store(&self, event: &DetectionEvent) -> Result<PathBuf, NotificationError> {
        let dir = self.root.join(event.category.as_str());
        tokio::fs::create_dir_all(&dir).await?;

        let extension =
            event.image.extension().and_then(|ext| ext.to_str()).unwrap_or("jpg").to_string();
        let file_name = format!(
            "{}_{}.{}",
            event.observed_at.format("%Y%m%d_%H%M%S%3f"),
            sanitize(&event.identifier),
            extension
        );
        let destination = dir.join(file_name);
        tokio::fs::copy(&event.image, &destination).await?;
        tracing::debug!(path = %destination.display(), "Image archived.");
        Ok(destination)
    }

    /// Deletes archived images last modified more than `retention` before `now`.
    /// Returns the number of deleted files.
    pub async fn purge_older_than(
        &self,
        retention: Duration,
        now: SystemTime,
    ) -> Result<usize, NotificationError> {
        let mut deleted = 0;
        for category in Category::ALL {
            let dir = self.root.join(category.as_str());
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                if !metadata.is_file() {
                    continue;
                }
                let age = now.duration_since(metadata.modified()?).unwrap_or(Duration::ZERO);
                if age > retention {
                    match tokio::fs::remove_file(entry.path()).await {
                        Ok(()) => deleted += 1,
                        Err(e) => tracing::warn!(
                            path = %entry.path().display(),
                            error = %e,
                            "Failed to delete archived image."
                        ),
                    }
                }
            }
        }
        Ok(deleted)
    }
}

fn sanitize(identifier: &str) -> String {
    let cleaned: String = identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "unknown".to_string() } else { cleaned }
}

/// Periodically deletes archived images past their retention window.
///
/// The retention comes from the live settings, so it follows `update_settings`.
pub struct RetentionSweeper {
    archive: Arc<ImageArchive>,
    interval: Duration,
    retention: watch::Receiver<Duration>,
}

impl RetentionSweeper {
    pub fn new(
        archive: Arc<ImageArchive>,
        interval: Duration,
        retention: watch::Receiver<Duration>,
    ) -> Self {
        Self { archive, interval, retention }
    }

    /// Runs one sweep immediately.
    pub async fn sweep_now(&self) -> Result<usize, NotificationError> {
        let retention = *self.retention.borrow();
        let deleted = self.archive.purge_older_than(retention, SystemTime::now()).await?;
        if deleted > 0 {
            tracing::info!(deleted, retention_secs = retention.as_secs(), "Archive sweep completed.");
        }
        Ok(deleted)
    }

    /// Sweeps every `interval` until cancelled.
    pub async fn run(self, cancellation_token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    tracing::info!("Archive sweeper shutting down.");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_now().await {
                        tracing::error!(error = %e, "Archive sweep failed.");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn event_with_image(dir: &Path, category: Category, identifier: &str) -> DetectionEvent {
        let image = dir.join("crop.png");
        std::fs::write(&image, b"png").unwrap();
        DetectionEvent::new(
            category,
            identifier,
            image,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 5).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_store_copies_into_category_dir() {
        let source = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let archive = ImageArchive::new(root.path());

        let event = event_with_image(source.path(), Category::Plate, "AB 12/3");
        let stored = archive.store(&event).await.unwrap();

        assert_eq!(stored, root.path().join("plate").join("20250301_123005000_AB_12_3.png"));
        assert_eq!(std::fs::read(&stored).unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_store_missing_image_fails() {
        let root = tempfile::tempdir().unwrap();
        let archive = ImageArchive::new(root.path());
        let event = DetectionEvent::new(Category::Car, "1", "/nonexistent/crop.jpg", Utc::now());
        assert!(matches!(archive.store(&event).await, Err(NotificationError::Io(_))));
    }

    #[tokio::test]
    async fn test_purge_deletes_only_expired_files() {
        let source = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let archive = ImageArchive::new(root.path());

        let old = archive.store(&event_with_image(source.path(), Category::Car, "old")).await.unwrap();
        let fresh =
            archive.store(&event_with_image(source.path(), Category::Person, "")).await.unwrap();
        let two_days_ago = SystemTime::now() - Duration::from_secs(48 * 3600);
        std::fs::File::options().write(true).open(&old).unwrap().set_modified(two_days_ago).unwrap();

        let deleted =
            archive.purge_older_than(Duration::from_secs(24 * 3600), SystemTime::now()).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(fresh.to_string_lossy().contains("_unknown."));
    }

    #[tokio::test]
    async fn test_sweeper_uses_current_retention() {
        let source = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let archive = Arc::new(ImageArchive::new(root.path()));
        let stored =
            archive.store(&event_with_image(source.path(), Category::Plate, "X")).await.unwrap();
        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options().write(true).open(&stored).unwrap().set_modified(an_hour_ago).unwrap();

        let (retention_tx, retention_rx) = watch::channel(Duration::from_secs(24 * 3600));
        let sweeper = RetentionSweeper::new(archive, Duration::from_secs(60), retention_rx);

        assert_eq!(sweeper.sweep_now().await.unwrap(), 0);
        retention_tx.send_replace(Duration::from_secs(60));
        assert_eq!(sweeper.sweep_now().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_empty_archive() {
        let root = tempfile::tempdir().unwrap();
        let archive = ImageArchive::new(root.path().join("never-created"));
        assert_eq!(archive.purge_older_than(Duration::ZERO, SystemTime::now()).await.unwrap(), 0);
    }
}

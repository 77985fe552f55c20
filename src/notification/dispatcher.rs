//! Delivers edge-triggered alerts outside the detection cycle.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    archive::ImageArchive,
    telegram::{RemoteMessenger, RemoteTarget},
};
use crate::models::DetectionEvent;

/// A newly counted detection that should be archived and/or sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub event: DetectionEvent,
    pub caption: String,
    /// Where to send the message. `None` skips remote delivery.
    pub remote: Option<RemoteTarget>,
    /// Whether to copy the image into the archive.
    pub archive: bool,
}

/// Receives alerts from the detection cycle and delivers each one once.
pub struct AlertDispatcher {
    messenger: Arc<dyn RemoteMessenger>,
    archive: Arc<ImageArchive>,
    receiver: mpsc::Receiver<Alert>,
}

impl AlertDispatcher {
    pub fn new(
        messenger: Arc<dyn RemoteMessenger>,
        archive: Arc<ImageArchive>,
        receiver: mpsc::Receiver<Alert>,
    ) -> Self {
        Self { messenger, archive, receiver }
    }

    /// Delivers alerts until cancelled or until every sender is gone, then
    /// delivers whatever is still queued.
    pub async fn run(mut self, cancellation_token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break,
                alert = self.receiver.recv() => match alert {
                    Some(alert) => self.deliver(alert).await,
                    None => break,
                },
            }
        }

        self.receiver.close();
        let mut drained = 0usize;
        while let Some(alert) = self.receiver.recv().await {
            self.deliver(alert).await;
            drained += 1;
        }
        tracing::info!(drained, "Alert dispatcher stopped.");
    }

    async fn deliver(&self, alert: Alert) {
        let event = &alert.event;

        if alert.archive {
            if let Err(e) = self.archive.store(event).await {
                tracing::warn!(
                    category = %event.category,
                    identifier = %event.identifier,
                    error = %e,
                    "Failed to archive image."
                );
            }
        }

        if let Some(target) = &alert.remote {
            match self.messenger.send_photo(target, &alert.caption, &event.image).await {
                Ok(()) => tracing::info!(
                    category = %event.category,
                    identifier = %event.identifier,
                    "Remote alert sent."
                ),
                Err(e) => tracing::error!(
                    category = %event.category,
                    identifier = %event.identifier,
                    error = %e,
                    "Failed to send remote alert."
                ),
            }
        }
    }
}

//! This module defines the boundary to the external recognition pipeline.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::DetectionEvent;

/// Custom error type for recognition source operations.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Reading from the pipeline failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame was requested before `start` or after `stop`.
    #[error("Source is not running")]
    NotRunning,
}

/// One frame of the video stream as seen by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// When the frame was captured.
    pub captured_at: DateTime<Utc>,
    /// Where the pipeline wrote the frame image, if it did.
    pub image: Option<PathBuf>,
}

/// A recognition pipeline that yields frames and the detections found in them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecognitionSource: Send {
    /// Starts producing frames.
    async fn start(&mut self) -> Result<(), SourceError>;

    /// Returns the next frame, or `None` when the stream has no frame to offer.
    async fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Takes the detections gathered since the previous call.
    fn recent_detections(&mut self) -> Vec<DetectionEvent>;

    /// Minimum interval between two reports of the same object.
    fn set_detection_interval(&mut self, interval: Duration);

    /// Stops producing frames and releases resources.
    async fn stop(&mut self);
}

//! A recognition source that tails a JSON-lines spool file.
//!
//! The external recognizer appends one JSON detection per line. Each call to
//! `next_frame` reads whatever was appended since the previous call.

use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::traits::{Frame, RecognitionSource, SourceError};
use crate::{engine::last_seen::LastSeen, models::DetectionEvent};

/// Parses complete JSON lines, skipping blank and malformed ones.
pub fn parse_detection_lines(text: &str) -> Vec<DetectionEvent> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<DetectionEvent>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "Skipping malformed detection line.");
                None
            }
        })
        .collect()
}

/// Tails a spool file written by the recognition pipeline.
#[derive(Debug)]
pub struct SpoolSource {
    path: PathBuf,
    running: bool,
    offset: u64,
    partial_line: Vec<u8>,
    interval: Duration,
    last_reported: LastSeen,
    recent: Vec<DetectionEvent>,
}

impl SpoolSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            running: false,
            offset: 0,
            partial_line: Vec::new(),
            interval: Duration::ZERO,
            last_reported: LastSeen::new(),
            recent: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn file_len(&self) -> Result<Option<u64>, SourceError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_appended(&mut self) -> Result<Vec<u8>, SourceError> {
        let Some(len) = self.file_len().await? else {
            return Ok(Vec::new());
        };
        if len < self.offset {
            tracing::info!(path = %self.path.display(), "Spool file was truncated, reading from start.");
            self.offset = 0;
            self.partial_line.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut appended = Vec::new();
        let read = file.read_to_end(&mut appended).await?;
        self.offset += read as u64;
        Ok(appended)
    }

    fn should_report(&mut self, event: &DetectionEvent) -> bool {
        if let Some(last) = self.last_reported.get(event.category, &event.identifier) {
            let elapsed = (event.observed_at - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.interval {
                return false;
            }
        }
        self.last_reported.record(event.category, &event.identifier, event.observed_at);
        true
    }
}

#[async_trait]
impl RecognitionSource for SpoolSource {
    async fn start(&mut self) -> Result<(), SourceError> {
        // Only detections appended after start are reported.
        self.offset = self.file_len().await?.unwrap_or(0);
        self.partial_line.clear();
        self.recent.clear();
        self.running = true;
        tracing::info!(path = %self.path.display(), offset = self.offset, "Spool source started.");
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if !self.running {
            return Err(SourceError::NotRunning);
        }

        let appended = self.read_appended().await?;
        self.partial_line.extend_from_slice(&appended);

        if let Some(last_newline) = self.partial_line.iter().rposition(|b| *b == b'\n') {
            let complete: Vec<u8> = self.partial_line.drain(..=last_newline).collect();
            let text = String::from_utf8_lossy(&complete);
            for event in parse_detection_lines(&text) {
                if self.should_report(&event) {
                    self.recent.push(event);
                }
            }
        }

        Ok(Some(Frame { captured_at: Utc::now(), image: None }))
    }

    fn recent_detections(&mut self) -> Vec<DetectionEvent> {
        std::mem::take(&mut self.recent)
    }

    fn set_detection_interval(&mut self, interval: Duration) {
        self.interval = interval;
        self.last_reported.widen(interval);
    }

    async fn stop(&mut self) {
        self.running = false;
        self.recent.clear();
        self.last_reported.clear();
        tracing::info!(path = %self.path.display(), "Spool source stopped.");
    }
}

use tokio::sync::watch;

#[cfg(test)]
use mockall::automock;

use super::frame::DisplayFrame;

/// Receives the rendered view once per refresh cycle.
#[cfg_attr(test, automock)]
pub trait DisplaySink: Send + Sync {
    /// Shows `frame`. Must not block.
    fn show(&self, frame: DisplayFrame);
}

/// Publishes frames on a watch channel, so a renderer only ever sees the
/// latest one.
#[derive(Debug)]
pub struct WatchDisplaySink {
    sender: watch::Sender<Option<DisplayFrame>>,
}

impl WatchDisplaySink {
    pub fn new() -> (Self, watch::Receiver<Option<DisplayFrame>>) {
        let (sender, receiver) = watch::channel(None);
        (Self { sender }, receiver)
    }
}

impl DisplaySink for WatchDisplaySink {
    fn show(&self, frame: DisplayFrame) {
        // No receivers is fine; the frame is simply dropped.
        self.sender.send_replace(Some(frame));
    }
}

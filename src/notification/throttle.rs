//! Per-object suppression of remote messages.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{engine::last_seen::LastSeen, models::DetectionEvent};

/// Remembers when a message was last sent about each object. Objects quiet
/// for longer than the longest delay ever used are eventually forgotten.
#[derive(Debug, Default)]
pub struct MessengerThrottle {
    last_sent: LastSeen,
}

impl MessengerThrottle {
    /// Returns true and records `now` if a message about `event` may be sent.
    pub fn allow(&mut self, event: &DetectionEvent, now: DateTime<Utc>, delay: Duration) -> bool {
        let identifier =
            if event.category.has_stable_identifier() { event.identifier.as_str() } else { "" };
        self.last_sent.widen(delay);

        if let Some(last) = self.last_sent.get(event.category, identifier) {
            match (now - last).to_std() {
                Ok(elapsed) if elapsed >= delay => {}
                _ => return false,
            }
        }
        self.last_sent.record(event.category, identifier, now);
        true
    }

    pub fn reset(&mut self) {
        self.last_sent.clear();
    }
}

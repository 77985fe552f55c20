//! # Notification channels
//!
//! The detection cycle notifies three kinds of channels:
//!
//! - the **display** (every cycle, see [`crate::display`]);
//! - the **audio** alert, level-triggered from the per-cycle presence set
//!   ([`AudioChannel`]);
//! - the **image archive** and the **remote messenger**, edge-triggered by
//!   newly counted detections. These are handed to the [`AlertDispatcher`]
//!   over a bounded channel so slow I/O never delays a cycle. Remote messages
//!   are limited per object by the [`MessengerThrottle`] and get exactly one
//!   delivery attempt.

pub mod archive;
pub mod audio;
pub mod dispatcher;
pub mod error;
pub mod telegram;
pub mod template;
pub mod throttle;

pub use archive::{ImageArchive, RetentionSweeper};
#[cfg(test)]
pub use audio::MockAudioSink;
pub use audio::{AudioChannel, AudioSink, LogAudioSink};
pub use dispatcher::{Alert, AlertDispatcher};
pub use error::NotificationError;
#[cfg(test)]
pub use telegram::MockRemoteMessenger;
pub use telegram::{RemoteMessenger, RemoteTarget, TelegramMessenger};
pub use template::{TemplateService, TemplateServiceError};
pub use throttle::MessengerThrottle;

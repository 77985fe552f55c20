//! Data models shared across the crate.

pub mod detection;
pub mod journal;
pub mod settings;

pub use detection::{Category, DetectionEvent, DisplayGroup, Presence};
pub use journal::JournalEntry;
pub use settings::{AudioTrigger, Settings, SettingsError};

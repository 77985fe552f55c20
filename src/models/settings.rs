//! Live settings that the running instance reads every refresh cycle and that
//! remote operators can change with `update_settings`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::detection::Category;

/// Errors produced when applying a settings patch.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The patch was not a JSON object.
    #[error("Settings update must be a mapping, got {0}")]
    NotAMapping(&'static str),

    /// The merged settings could not be deserialized (unknown key, wrong type).
    #[error("Invalid settings: {0}")]
    Invalid(#[from] serde_json::Error),

    /// A value was out of its allowed range.
    #[error("Invalid value for {field}: {reason}")]
    OutOfRange {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// The full set of live settings.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    pub detection: DetectionSettings,
    pub audio: AudioSettings,
    pub telegram: TelegramSettings,
    pub archive: ArchiveSettings,
    /// Hides imagery, identifiers and counters on the display.
    pub privacy_mode: bool,
}

/// Detection and deduplication settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct DetectionSettings {
    /// Minimum seconds before the same object is counted again.
    pub cooldown_secs: f64,
    pub person_enabled: bool,
    pub car_enabled: bool,
    pub plate_enabled: bool,
    pub traffic_light_enabled: bool,
    /// Forwarded to the recognition pipeline.
    pub confidence_threshold: f64,
    /// Forwarded to the recognition pipeline.
    pub ocr_threshold: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 3.0,
            person_enabled: true,
            car_enabled: true,
            plate_enabled: true,
            traffic_light_enabled: true,
            confidence_threshold: 0.5,
            ocr_threshold: 0.6,
        }
    }
}

impl DetectionSettings {
    /// The cooldown window as a `Duration`.
    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_secs).unwrap_or_default()
    }

    /// Whether detections of `category` should be processed at all.
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Person => self.person_enabled,
            Category::Car => self.car_enabled,
            Category::Plate => self.plate_enabled,
            Category::TrafficLight => self.traffic_light_enabled,
        }
    }
}

/// When the audio channel plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioTrigger {
    /// Once when a category goes from absent to present.
    #[default]
    OnAppearance,
    /// For every present category on every cycle.
    EveryCycle,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AudioSettings {
    pub enabled: bool,
    pub trigger: AudioTrigger,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { enabled: true, trigger: AudioTrigger::default() }
    }
}

/// Remote messaging settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TelegramSettings {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
    /// Minimum seconds between two messages about the same object.
    pub notification_delay_secs: f64,
    /// Jinja template rendered with the detection as context.
    pub caption_template: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            notification_delay_secs: 5.0,
            caption_template: "{{ label }}: {{ identifier }}".to_string(),
        }
    }
}

impl TelegramSettings {
    pub fn notification_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.notification_delay_secs).unwrap_or_default()
    }

    /// True when messages can actually be sent.
    pub fn is_deliverable(&self) -> bool {
        self.enabled && !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ArchiveSettings {
    pub enabled: bool,
    /// Archived images older than this are deleted by the sweeper.
    pub retention_hours: u64,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self { enabled: true, retention_hours: 24 }
    }
}

impl ArchiveSettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(3600))
    }
}

impl Settings {
    /// Returns a copy of these settings with `patch` deep-merged into them.
    ///
    /// Nested objects are merged key by key, every other value replaces the
    /// current one. The result is validated as a whole, so a rejected patch
    /// leaves nothing half applied.
    pub fn merged(&self, patch: &Value) -> Result<Settings, SettingsError> {
        if !patch.is_object() {
            return Err(SettingsError::NotAMapping(json_type_name(patch)));
        }
        let mut current = serde_json::to_value(self)?;
        merge_json(&mut current, patch);
        let updated: Settings = serde_json::from_value(current)?;
        updated.validate()?;
        Ok(updated)
    }

    /// Checks the numeric ranges serde cannot express.
    pub fn validate(&self) -> Result<(), SettingsError> {
        duration_secs("detection.cooldown_secs", self.detection.cooldown_secs)?;
        duration_secs("telegram.notification_delay_secs", self.telegram.notification_delay_secs)?;
        unit_interval("detection.confidence_threshold", self.detection.confidence_threshold)?;
        unit_interval("detection.ocr_threshold", self.detection.ocr_threshold)?;
        if self.archive.retention_hours == 0 {
            return Err(SettingsError::OutOfRange {
                field: "archive.retention_hours",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

fn duration_secs(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if Duration::try_from_secs_f64(value).is_err() {
        return Err(SettingsError::OutOfRange {
            field,
            reason: "must be a non-negative number of seconds that fits a duration",
        });
    }
    Ok(())
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SettingsError::OutOfRange { field, reason: "must be within [0, 1]" });
    }
    Ok(())
}

fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

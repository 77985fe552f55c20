//! Entries of the update journal.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// One accepted remote mutation, stored so it can be replayed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum JournalEntry {
    /// Properties applied to a presentation element.
    GuiModification {
        /// The addressed element.
        element_id: String,
        /// The properties that were set.
        properties: Map<String, Value>,
    },
    /// A settings patch that was merged into the live settings.
    SettingsUpdate(Value),
    /// A function that was installed into the function registry.
    FunctionDefinition {
        /// Name the function is callable by.
        name: String,
        /// Rhai source of the function.
        code: String,
    },
}

impl JournalEntry {
    /// The stored `kind` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            JournalEntry::GuiModification { .. } => "gui_modification",
            JournalEntry::SettingsUpdate(_) => "settings_update",
            JournalEntry::FunctionDefinition { .. } => "function_definition",
        }
    }

    /// The stored payload, without the discriminator.
    pub fn payload(&self) -> Value {
        match self {
            JournalEntry::GuiModification { element_id, properties } => {
                json!({ "element_id": element_id, "properties": properties })
            }
            JournalEntry::SettingsUpdate(patch) => patch.clone(),
            JournalEntry::FunctionDefinition { name, code } => {
                json!({ "name": name, "code": code })
            }
        }
    }

    /// Rebuilds an entry from its stored `kind` and payload.
    pub fn from_parts(kind: &str, payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({ "kind": kind, "payload": payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_rebuild_the_entry() {
        let entries = vec![
            JournalEntry::GuiModification {
                element_id: "status_bar".into(),
                properties: json!({ "text": "hello" }).as_object().cloned().unwrap(),
            },
            JournalEntry::SettingsUpdate(json!({ "privacy_mode": true })),
            JournalEntry::FunctionDefinition {
                name: "greet".into(),
                code: "fn greet() { 1 }".into(),
            },
        ];

        for entry in entries {
            let rebuilt = JournalEntry::from_parts(entry.kind(), entry.payload()).unwrap();
            assert_eq!(rebuilt, entry);
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(JournalEntry::from_parts("reboot", json!({})).is_err());
    }
}

//! Wire models shared between the Vigil command server and its clients.
//!
//! A request is a single JSON document `{"command": ..., "data": {...}}` and
//! every request is answered by a single `{"success": ..., "error": ...}`
//! document on the same connection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Applies property changes to an addressable presentation element.
pub const MODIFY_GUI: &str = "modify_gui";

/// Merges a settings mapping into the live configuration.
pub const UPDATE_SETTINGS: &str = "update_settings";

/// Compiles and installs a named function into the running instance.
pub const ADD_FUNCTION: &str = "add_function";

/// Error text returned for any command the server does not recognize.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// A request sent by a remote operator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CommandRequest {
    /// The command name. A missing command is answered as unknown.
    #[serde(default)]
    pub command: Option<String>,

    /// Command arguments. Defaults to an empty mapping.
    #[serde(default = "empty_object")]
    pub data: Value,
}

impl CommandRequest {
    /// Creates a request for the given command and data.
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self { command: Some(command.into()), data }
    }
}

/// The answer to a single request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CommandResponse {
    /// Whether the command was applied.
    pub success: bool,

    /// A human readable reason when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    /// A successful response.
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    /// A failed response carrying the given reason.
    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }

    /// The response for an unrecognized command.
    pub fn unknown_command() -> Self {
        Self::failure(UNKNOWN_COMMAND)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_defaults_missing_data_to_empty_object() {
        let request: CommandRequest = serde_json::from_str(r#"{"command":"frobnicate"}"#).unwrap();
        assert_eq!(request.command.as_deref(), Some("frobnicate"));
        assert_eq!(request.data, json!({}));
    }

    #[test]
    fn test_request_without_command() {
        let request: CommandRequest = serde_json::from_str(r#"{"data":{"a":1}}"#).unwrap();
        assert!(request.command.is_none());
        assert_eq!(request.data, json!({"a": 1}));
    }

    #[test]
    fn test_unknown_command_wire_format() {
        let encoded = serde_json::to_string(&CommandResponse::unknown_command()).unwrap();
        assert_eq!(encoded, r#"{"success":false,"error":"Unknown command"}"#);
    }

    #[test]
    fn test_success_omits_error() {
        let encoded = serde_json::to_string(&CommandResponse::ok()).unwrap();
        assert_eq!(encoded, r#"{"success":true}"#);
    }
}

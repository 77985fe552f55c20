//! Decoding of request documents and their command payloads.
//!
//! There is no framing: every read is expected to hold exactly one JSON
//! request. A read that fills the whole buffer without parsing means the
//! request was cut off, and the rest of the stream can no longer be split
//! into documents.

use command_models::{ADD_FUNCTION, CommandRequest, MODIFY_GUI, UPDATE_SETTINGS};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::engine::Mutation;

/// Why a request could not be decoded.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The request did not fit into the read buffer.
    #[error("Malformed request: request exceeds {limit} bytes")]
    Oversized { limit: usize },

    /// The bytes were not a JSON document.
    #[error("Malformed request: {0}")]
    InvalidJson(String),

    /// The document was valid JSON but not a request object.
    #[error("Malformed request: expected a JSON object with a command")]
    NotAnObject,

    /// The command's `data` did not have the expected shape.
    #[error("Malformed data for {command}: {reason}")]
    InvalidData { command: &'static str, reason: String },
}

impl ProtocolError {
    /// Whether the session must be closed after reporting this error.
    pub fn closes_connection(&self) -> bool {
        matches!(self, ProtocolError::Oversized { .. })
    }
}

/// Decodes the bytes of one read. `buffer_size` is the size of the buffer the
/// bytes were read into.
pub fn parse_request(bytes: &[u8], buffer_size: usize) -> Result<CommandRequest, ProtocolError> {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(_) if bytes.len() >= buffer_size => {
            return Err(ProtocolError::Oversized { limit: buffer_size });
        }
        Err(e) => return Err(ProtocolError::InvalidJson(e.to_string())),
    };
    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }
    serde_json::from_value(value).map_err(|_| ProtocolError::NotAnObject)
}

#[derive(Debug, Deserialize)]
struct ModifyGuiData {
    element_id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AddFunctionData {
    name: String,
    code: String,
}

/// Maps a request to the mutation it asks for. `Ok(None)` means the command
/// is not known.
pub fn decode_command(request: &CommandRequest) -> Result<Option<Mutation>, ProtocolError> {
    let Some(command) = request.command.as_deref() else {
        return Ok(None);
    };
    let mutation = match command {
        MODIFY_GUI => {
            let data: ModifyGuiData = decode_data(MODIFY_GUI, &request.data)?;
            Mutation::ModifyElement { element_id: data.element_id, properties: data.properties }
        }
        UPDATE_SETTINGS => {
            if !request.data.is_object() {
                return Err(ProtocolError::InvalidData {
                    command: UPDATE_SETTINGS,
                    reason: "expected a mapping".to_string(),
                });
            }
            Mutation::UpdateSettings(request.data.clone())
        }
        ADD_FUNCTION => {
            let data: AddFunctionData = decode_data(ADD_FUNCTION, &request.data)?;
            Mutation::DefineFunction { name: data.name, code: data.code }
        }
        _ => return Ok(None),
    };
    Ok(Some(mutation))
}

fn decode_data<T: for<'de> Deserialize<'de>>(
    command: &'static str,
    data: &Value,
) -> Result<T, ProtocolError> {
    T::deserialize(data)
        .map_err(|e| ProtocolError::InvalidData { command, reason: e.to_string() })
}

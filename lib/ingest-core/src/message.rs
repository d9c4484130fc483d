//! Broker message shapes.
//!
//! Messages are dynamically keyed JSON objects — a given delivery may carry
//! fields the core never looks at, and those fields must flow through
//! untouched to the next stage (see `org_msg` in [`ArchivedMessage`]). Rather
//! than modeling every possible field, [`Message`] wraps the raw JSON object
//! (the same shape `vector`'s own `Value` type takes for a dynamically keyed
//! event — see `lib/shared/src/event/value/mod.rs` in the reference tree)
//! and typed views ([`IngestRequest`], [`ChecksumEntry`], ...) are parsed out
//! of it on demand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::model::ChecksumAlgorithm;

/// A dynamically keyed broker payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message(pub Map<String, Value>);

impl Message {
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        match value {
            Value::Object(map) => Ok(Message(map)),
            other => Err(MessageError::NotAnObject {
                found: value_type_name(&other),
            }),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, MessageError> {
        self.get_str(key).ok_or_else(|| MessageError::MissingField {
            field: key.to_string(),
        })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Parses a typed field out of the payload, for stages that need more
    /// than a bare string (e.g. `encrypted_checksums`, `decrypted_checksums`).
    pub fn parse_field<T: for<'de> Deserialize<'de>>(
        &self,
        key: &str,
    ) -> Result<Option<T>, MessageError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| MessageError::Deserialize {
                    field: key.to_string(),
                    source,
                }),
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, snafu::Snafu)]
pub enum MessageError {
    #[snafu(display("message payload was not a JSON object (found {found})"))]
    NotAnObject { found: &'static str },
    #[snafu(display("message is missing required field {field:?}"))]
    MissingField { field: String },
    #[snafu(display("field {field:?} could not be parsed: {source}"))]
    Deserialize {
        field: String,
        source: serde_json::Error,
    },
}

/// One `{type, value}` entry of an `encrypted_checksums` / `decrypted_checksums` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumEntry {
    #[serde(rename = "type")]
    pub algorithm: ChecksumAlgorithm,
    pub value: String,
}

impl fmt::Display for ChecksumEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}={}", self.algorithm, self.value)
    }
}

/// The minimal fields the ingest worker requires out of a `files` delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub filepath: String,
    pub user: String,
    #[serde(default)]
    pub encrypted_checksums: Vec<ChecksumEntry>,
}

/// The minimal fields the finalize worker requires out of a `stableIDs` delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeRequest {
    pub accession_id: String,
    pub filepath: String,
    pub user: String,
    pub decrypted_checksums: Vec<ChecksumEntry>,
}

impl FinalizeRequest {
    pub fn decrypted_sha256(&self) -> Option<&str> {
        self.decrypted_checksums
            .iter()
            .find(|c| c.algorithm.is_sha256())
            .map(|c| c.value.as_str())
    }
}

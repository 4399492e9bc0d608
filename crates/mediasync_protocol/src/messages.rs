//! Request and response bodies.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error codes carried in the `error` field of failure responses.
pub mod error_codes {
    /// Missing or incorrect credential.
    pub const UNAUTHORIZED: &str = "Unauthorized";
    /// Purge target outside the prefix allow-list.
    pub const PURGE_DENIED: &str = "purge_denied";
    /// Raw body larger than the configured maximum.
    pub const PAYLOAD_TOO_LARGE: &str = "Payload too large";
    /// Body is not valid JSON.
    pub const INVALID_JSON: &str = "Invalid JSON";
    /// Body is valid JSON of the wrong shape.
    pub const INVALID_BODY: &str = "Invalid body";
    /// HTTP method outside GET/POST/DELETE/OPTIONS.
    pub const METHOD_NOT_ALLOWED: &str = "Method Not Allowed";
    /// Unexpected failure while processing.
    pub const INTERNAL: &str = "Internal Server Error";
    /// The gateway was started without a store.
    pub const STORE_NOT_CONFIGURED: &str = "Store not configured";
}

/// Body of a write request: `{ key: [records...] }`.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBody {
    entries: Map<String, Value>,
}

impl WriteBody {
    /// Parses a raw write body. The top-level value must be an object.
    pub fn parse(bytes: &[u8]) -> ProtocolResult<Self> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(ProtocolError::NotAnObject(json_type_name(&other))),
        }
    }

    /// Iterates over `(key, value)` entries in body order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Consumes the body, yielding owned entries.
    pub fn into_entries(self) -> impl Iterator<Item = (String, Value)> {
        self.entries.into_iter()
    }

    /// Number of keys in the body.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the body has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shape of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRequest {
    /// Remove a key and its whole list.
    Purge {
        /// Trimmed key name.
        key: String,
    },
    /// Remove every record with `url` from each of `keys`.
    RemoveUrl {
        /// Trimmed target URL.
        url: String,
        /// Candidate keys, trimmed. Blank entries are kept for the caller
        /// to filter alongside the prefix allow-list.
        keys: Vec<String>,
    },
    /// Any other shape. Not an error.
    Ignored,
}

impl DeleteRequest {
    /// Parses a raw delete body.
    ///
    /// Unparseable bodies are treated as an empty object and therefore
    /// yield [`DeleteRequest::Ignored`].
    pub fn parse(bytes: &[u8]) -> Self {
        let body = serde_json::from_slice::<Value>(bytes).unwrap_or(Value::Object(Map::new()));
        Self::from_value(&body)
    }

    /// Classifies an already-decoded delete body.
    pub fn from_value(body: &Value) -> Self {
        let Some(obj) = body.as_object() else {
            return DeleteRequest::Ignored;
        };

        if let Some(purge) = obj.get("purgeKey").filter(|v| is_truthy(v)) {
            return DeleteRequest::Purge {
                key: coerce_string(purge).trim().to_string(),
            };
        }

        let url = obj.get("url").filter(|v| is_truthy(v));
        let keys = obj.get("keys").and_then(Value::as_array);
        if let (Some(url), Some(keys)) = (url, keys) {
            let keys = keys
                .iter()
                .map(|k| {
                    if is_truthy(k) {
                        coerce_string(k).trim().to_string()
                    } else {
                        String::new()
                    }
                })
                .collect();
            return DeleteRequest::RemoveUrl {
                url: coerce_string(url).trim().to_string(),
                keys,
            };
        }

        DeleteRequest::Ignored
    }
}

/// Success acknowledgement bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum StatusBody {
    /// Write accepted.
    #[serde(rename = "ok")]
    Ok,
    /// A key was purged.
    #[serde(rename = "key_deleted")]
    KeyDeleted {
        /// The purged key.
        key: String,
    },
    /// A URL was removed from the lists that contained it.
    #[serde(rename = "single_deleted_dynamically")]
    SingleDeleted,
    /// The delete body had no recognized shape.
    #[serde(rename = "ignored_delete")]
    Ignored,
}

/// Failure body: `{ "error": ..., "message"?: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short error code.
    pub error: String,
    /// Detail, present for internal errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Creates an error body without detail.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    /// Attaches a detail message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Loose truthiness: null, false, zero and the empty string are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Loose string coercion. Composite values use their JSON text.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

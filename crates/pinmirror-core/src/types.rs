//! Shared types for the mirroring pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{DecodeError, SourceError};

/// Structured fields attached to a name update (e.g. `{"content": "ipfs://…"}`).
pub type UpdateFields = Map<String, Value>;

// ─── TxRef ────────────────────────────────────────────────────────────────────

/// Opaque reference to the transaction that emitted an event (a tx hash on EVM).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(pub String);

impl TxRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ─── ChangeEvent ──────────────────────────────────────────────────────────────

/// A change event as delivered by the event source.
///
/// Events are delivered in non-decreasing `block_number` order. `name` is the
/// label the source gives the event (the EVM source uses the ABI event name);
/// the mirrored name comes from decoding the transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub name: String,
    /// Raw log data.
    pub raw_payload: Vec<u8>,
    pub block_number: u64,
    /// Position of the log within its block.
    pub log_index: u32,
    pub tx_ref: TxRef,
}

/// A change event paired with the result of fetching its transaction payload.
#[derive(Debug)]
pub struct FetchedEvent {
    pub event: ChangeEvent,
    pub payload: Result<Vec<u8>, SourceError>,
}

// ─── Updates ──────────────────────────────────────────────────────────────────

/// `(name, fields)` decoded from a transaction payload, before the block
/// number is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedUpdate {
    pub name: String,
    pub fields: Option<UpdateFields>,
}

/// A decoded update for one name at one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedUpdate {
    pub name: String,
    pub fields: Option<UpdateFields>,
    pub block_number: u64,
}

impl ParsedUpdate {
    pub fn new(decoded: DecodedUpdate, block_number: u64) -> Self {
        Self {
            name: decoded.name,
            fields: decoded.fields,
            block_number,
        }
    }

    /// Returns `true` if there are no fields, or the field map is empty.
    pub fn has_no_fields(&self) -> bool {
        self.fields.as_ref().map_or(true, Map::is_empty)
    }

    /// The `content` field, unless it is missing or falsy
    /// (`null`, `false`, `0`, `""`).
    pub fn content(&self) -> Option<&Value> {
        self.fields
            .as_ref()?
            .get("content")
            .filter(|v| is_truthy(v))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse the raw fields string carried by an update call.
///
/// An empty string and JSON `null` mean "no fields". Any other non-object
/// JSON value is rejected.
pub fn parse_fields(raw: &str) -> Result<Option<UpdateFields>, DecodeError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::Bool(_) => Err(DecodeError::FieldsNotObject { kind: "bool" }),
        Value::Number(_) => Err(DecodeError::FieldsNotObject { kind: "number" }),
        Value::String(_) => Err(DecodeError::FieldsNotObject { kind: "string" }),
        Value::Array(_) => Err(DecodeError::FieldsNotObject { kind: "array" }),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

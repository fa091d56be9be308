// Document Codec
//
// Canonical string keys for document identifiers. Every read and write
// path derives its store key through `normalize_id`, so the identifier
// held by the target store is always the string form.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::store::Timestamp;

/// A replicated document body: field name to arbitrary JSON value.
pub type Document = Map<String, Value>;

/// Identifier field used when none is configured.
pub const DEFAULT_ID_FIELD: &str = "_id";

/// Modification timestamp field used when none is configured.
pub const DEFAULT_TIMESTAMP_FIELD: &str = "_ts";

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("document has no `{field}` field")]
    MissingIdentifier { field: String },

    #[error("identifier {value} is not string-coercible: {reason}")]
    NotCoercible { value: String, reason: &'static str },
}

/// Convert any identifier representation to its canonical string form.
///
/// Strings pass through, numbers use their JSON rendering, and the
/// extended-JSON wrappers `$oid`, `$uuid`, `$numberLong` and `$numberInt`
/// are unwrapped. Everything else is rejected.
pub fn normalize_id(id: &Value) -> Result<String, CodecError> {
    match id {
        Value::String(s) if s.is_empty() => Err(not_coercible(id, "empty string")),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Object(wrapper) => normalize_extended(id, wrapper),
        Value::Bool(_) => Err(not_coercible(id, "boolean")),
        Value::Null => Err(not_coercible(id, "null")),
        Value::Array(_) => Err(not_coercible(id, "sequence")),
    }
}

fn normalize_extended(id: &Value, wrapper: &Map<String, Value>) -> Result<String, CodecError> {
    let mut entries = wrapper.iter();
    let (tag, inner) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => return Err(not_coercible(id, "mapping")),
    };

    match (tag.as_str(), inner) {
        ("$oid", Value::String(hex))
            if hex.len() == 24 && hex.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            Ok(hex.to_ascii_lowercase())
        }
        ("$oid", _) => Err(not_coercible(id, "malformed object id")),

        ("$uuid", Value::String(raw)) => Uuid::parse_str(raw)
            .map(|uuid| uuid.hyphenated().to_string())
            .map_err(|_| not_coercible(id, "malformed uuid")),
        ("$uuid", _) => Err(not_coercible(id, "malformed uuid")),

        ("$numberLong" | "$numberInt", Value::String(digits)) => digits
            .parse::<i64>()
            .map(|n| n.to_string())
            .map_err(|_| not_coercible(id, "malformed integer")),

        _ => Err(not_coercible(id, "mapping")),
    }
}

fn not_coercible(id: &Value, reason: &'static str) -> CodecError {
    CodecError::NotCoercible {
        value: id.to_string(),
        reason,
    }
}

/// Read the canonical key of a document without modifying it.
pub fn document_key(document: &Document, id_field: &str) -> Result<String, CodecError> {
    let id = document
        .get(id_field)
        .ok_or_else(|| CodecError::MissingIdentifier {
            field: id_field.to_string(),
        })?;
    normalize_id(id)
}

/// Rewrite the identifier field in place to its string form and return it.
pub fn canonicalize(document: &mut Document, id_field: &str) -> Result<String, CodecError> {
    let key = document_key(document, id_field)?;
    document.insert(id_field.to_string(), Value::String(key.clone()));
    Ok(key)
}

/// Read a modification timestamp from a document field.
///
/// Accepts a plain unsigned integer or an extended-JSON `$timestamp`
/// (`{"t": seconds, "i": increment}`), which is packed as `t << 32 | i`.
pub fn read_timestamp(document: &Document, field: &str) -> Option<Timestamp> {
    match document.get(field)? {
        Value::Number(n) => n.as_u64().map(Timestamp),
        Value::Object(wrapper) => {
            let parts = wrapper.get("$timestamp")?;
            let seconds = parts.get("t")?.as_u64()?;
            let increment = parts.get("i")?.as_u64()?;
            Some(Timestamp((seconds << 32) | (increment & 0xFFFF_FFFF)))
        }
        _ => None,
    }
}

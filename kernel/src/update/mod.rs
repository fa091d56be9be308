// Update Resolver
//
// Computes the new body of a document from its current body and a
// partial-update specification. Pure and deterministic; the write engine
// feeds it a fresh read on every CAS attempt.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{canonicalize, CodecError, Document};

mod path;

pub use path::MAX_ARRAY_PADDING;

/// Key of the set-list in an update specification.
pub const SET_KEY: &str = "$set";

/// Key of the unset-list in an update specification.
pub const UNSET_KEY: &str = "$unset";

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("malformed `{key}` entry: {reason}")]
    MalformedSpec { key: &'static str, reason: String },

    #[error("update does not apply at `{path}`: {reason}")]
    DoesNotApply { path: String, reason: String },

    #[error(transparent)]
    Identifier(#[from] CodecError),
}

/// A partial-update specification as delivered by the change-log tailer.
///
/// Either a patch (`$set` and/or `$unset` present) or, when neither key
/// is present, an opaque full replacement of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateSpec(Document);

impl UpdateSpec {
    pub fn new(raw: Document) -> Self {
        Self(raw)
    }

    /// Start an empty patch. Chain `set` / `unset` to fill it.
    pub fn patch() -> Self {
        let mut raw = Document::new();
        raw.insert(SET_KEY.into(), Value::Object(Document::new()));
        raw.insert(UNSET_KEY.into(), Value::Array(Vec::new()));
        Self(raw)
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        if let Some(Value::Object(fields)) = self.0.get_mut(SET_KEY) {
            fields.insert(field.into(), value);
        }
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        if let Some(Value::Array(fields)) = self.0.get_mut(UNSET_KEY) {
            fields.push(Value::String(field.into()));
        }
        self
    }

    /// True when a set-list or unset-list is present.
    pub fn is_patch(&self) -> bool {
        self.0.contains_key(SET_KEY) || self.0.contains_key(UNSET_KEY)
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    fn set_entries(&self) -> Result<Vec<(&str, &Value)>, ResolveError> {
        match self.0.get(SET_KEY) {
            None => Ok(Vec::new()),
            Some(Value::Object(fields)) => Ok(fields.iter().map(|(k, v)| (k.as_str(), v)).collect()),
            Some(other) => Err(ResolveError::MalformedSpec {
                key: SET_KEY,
                reason: format!("expected a mapping, got {other}"),
            }),
        }
    }

    /// Unset fields, accepting either a list of names or the wire-format
    /// mapping `{field: ""}` whose values are ignored.
    fn unset_fields(&self) -> Result<Vec<&str>, ResolveError> {
        match self.0.get(UNSET_KEY) {
            None => Ok(Vec::new()),
            Some(Value::Object(fields)) => Ok(fields.keys().map(String::as_str).collect()),
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().ok_or_else(|| ResolveError::MalformedSpec {
                        key: UNSET_KEY,
                        reason: format!("field name {name} is not a string"),
                    })
                })
                .collect(),
            Some(other) => Err(ResolveError::MalformedSpec {
                key: UNSET_KEY,
                reason: format!("expected a list or mapping, got {other}"),
            }),
        }
    }
}

impl From<Document> for UpdateSpec {
    fn from(raw: Document) -> Self {
        Self(raw)
    }
}

/// Compute the new document body.
///
/// A spec without `$set` / `$unset` is a full replacement and is returned
/// verbatim. Otherwise every set entry is applied, then every unset entry,
/// and the identifier is re-normalized to its string form.
pub fn resolve(existing: &Document, spec: &UpdateSpec, id_field: &str) -> Result<Document, ResolveError> {
    if !spec.is_patch() {
        return Ok(spec.as_document().clone());
    }

    let sets = spec.set_entries()?;
    let unsets = spec.unset_fields()?;

    let mut updated = existing.clone();
    for (field, value) in sets {
        path::set_path(&mut updated, field, value.clone())?;
    }
    for field in unsets {
        path::unset_path(&mut updated, field);
    }

    canonicalize(&mut updated, id_field)?;
    Ok(updated)
}

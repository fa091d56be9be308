// Dotted Field Paths
//
// `a.b.0.c` style addressing for set/unset entries. Object segments are
// keys, segments under an array are indices.

use serde_json::{Map, Value};

use super::ResolveError;
use crate::document::Document;

/// Most null slots a single set may add past the end of a sequence.
pub const MAX_ARRAY_PADDING: usize = 10_000;

/// Assign `value` at `path`, creating intermediate objects as needed.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Value) -> Result<(), ResolveError> {
    let segments: Vec<&str> = path.split('.').collect();
    let (leaf, parents) = match segments.split_last() {
        Some((leaf, parents)) if !parents.is_empty() => (*leaf, parents),
        _ => {
            document.insert(path.to_string(), value);
            return Ok(());
        }
    };

    let mut cursor = document
        .entry(parents[0].to_string())
        .or_insert_with(empty_object);
    for segment in &parents[1..] {
        cursor = descend_or_create(cursor, segment, path)?;
    }

    match cursor {
        Value::Object(fields) => {
            fields.insert(leaf.to_string(), value);
        }
        Value::Array(items) => {
            let index = array_index(leaf, items.len(), path)?;
            if index >= items.len() {
                let len = index
                    .checked_add(1)
                    .ok_or_else(|| does_not_apply(path, "array index too large"))?;
                items.resize(len, Value::Null);
            }
            items[index] = value;
        }
        _ => return Err(does_not_apply(path, "parent is not a mapping or sequence")),
    }

    Ok(())
}

/// Remove the field at `path`. Array elements are nulled rather than
/// removed so sibling indices stay stable. Missing paths are ignored.
pub(crate) fn unset_path(document: &mut Document, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let (leaf, parents) = match segments.split_last() {
        Some((leaf, parents)) if !parents.is_empty() => (*leaf, parents),
        _ => {
            document.remove(path);
            return;
        }
    };

    let mut cursor = match document.get_mut(parents[0]) {
        Some(value) => value,
        None => return,
    };
    for segment in &parents[1..] {
        cursor = match descend(cursor, segment) {
            Some(value) => value,
            None => return,
        };
    }

    match cursor {
        Value::Object(fields) => {
            fields.remove(leaf);
        }
        Value::Array(items) => {
            if let Some(slot) = leaf.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *slot = Value::Null;
            }
        }
        _ => {}
    }
}

fn descend<'a>(container: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match container {
        Value::Object(fields) => fields.get_mut(segment),
        Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn descend_or_create<'a>(
    container: &'a mut Value,
    segment: &str,
    path: &str,
) -> Result<&'a mut Value, ResolveError> {
    match container {
        Value::Object(fields) => Ok(fields.entry(segment.to_string()).or_insert_with(empty_object)),
        Value::Array(items) => {
            let index = array_index(segment, items.len(), path)?;
            if index >= items.len() {
                items.resize(index, Value::Null);
                items.push(empty_object());
            }
            Ok(&mut items[index])
        }
        _ => Err(does_not_apply(path, "traverses a scalar value")),
    }
}

fn array_index(segment: &str, len: usize, path: &str) -> Result<usize, ResolveError> {
    let index = segment
        .parse::<usize>()
        .map_err(|_| does_not_apply(path, "non-numeric segment into a sequence"))?;
    if index.saturating_sub(len) > MAX_ARRAY_PADDING {
        return Err(does_not_apply(path, "array index too large"));
    }
    Ok(index)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn does_not_apply(path: &str, reason: &str) -> ResolveError {
    ResolveError::DoesNotApply {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

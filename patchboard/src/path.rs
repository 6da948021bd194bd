//! Dotted-path resolution over JSON documents.
//!
//! Paths look like `state.params.counter` or `blocks.2.props.fields.0.key`.
//! Each segment selects an object key, or an array index when the segment
//! is all digits and the parent is an array. Integer-looking object keys
//! are still treated as keys; only arrays get index semantics.
//!
//! Writes auto-create a missing *trailing* key only under the two state
//! bags (`state.params.*` / `state.runtime.*`); anywhere else a missing
//! segment is an addressing error.

use serde_json::Value;

use crate::error::PatchError;

/// Split a dotted path into its segments. Empty segments are dropped.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn as_index(segment: &str) -> Option<usize> {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}

/// Walk `root` down `path`, returning the value if every segment resolves.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for seg in segments(path) {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(as_index(seg)?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Like [`get`], but clones the value and falls back to `default`.
pub fn get_or(root: &Value, path: &str, default: Value) -> Value {
    get(root, path).cloned().unwrap_or(default)
}

/// Mutable walk down `path`.
pub fn get_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut cur = root;
    for seg in segments(path) {
        cur = match cur {
            Value::Object(map) => map.get_mut(seg)?,
            Value::Array(items) => {
                let idx = as_index(seg)?;
                items.get_mut(idx)?
            }
            _ => return None,
        };
    }
    Some(cur)
}

/// True when writes to `path` may grow the target mapping by one
/// trailing key: only the two state bags behave like open dictionaries.
pub fn allows_create(path: &str) -> bool {
    path.starts_with("state.params.") || path.starts_with("state.runtime.")
}

/// Write `value` at `path`, replacing whatever is there.
///
/// Creation policy follows [`allows_create`]: a missing final key under a
/// state bag is inserted, everywhere else the full path must already
/// resolve. Missing intermediate segments are always an error, as is an
/// out-of-bounds array index.
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    set_with(root, path, value, allows_create(path))
}

/// [`set`] with an explicit creation policy for the trailing segment.
pub fn set_with(
    root: &mut Value,
    path: &str,
    value: Value,
    create_missing: bool,
) -> Result<(), PatchError> {
    let segs = segments(path);
    let Some((last, parents)) = segs.split_last() else {
        return Err(PatchError::addressing(path, "empty path"));
    };

    let mut cur = root;
    for seg in parents {
        cur = match cur {
            Value::Object(map) => map
                .get_mut(*seg)
                .ok_or_else(|| PatchError::addressing(path, format!("missing key '{seg}'")))?,
            Value::Array(items) => {
                let idx = as_index(seg)
                    .ok_or_else(|| PatchError::addressing(path, format!("'{seg}' is not an index")))?;
                let len = items.len();
                items.get_mut(idx).ok_or_else(|| {
                    PatchError::addressing(path, format!("index {idx} out of bounds (len {len})"))
                })?
            }
            other => {
                let kind = json_kind(other);
                return Err(PatchError::addressing(
                    path,
                    format!("cannot descend into {kind} at '{seg}'"),
                ));
            }
        };
    }

    match cur {
        Value::Object(map) => {
            if map.contains_key(*last) || create_missing {
                map.insert((*last).to_string(), value);
                Ok(())
            } else {
                Err(PatchError::addressing(path, format!("missing key '{last}'")))
            }
        }
        Value::Array(items) => {
            let idx = as_index(last)
                .ok_or_else(|| PatchError::addressing(path, format!("'{last}' is not an index")))?;
            if idx < items.len() {
                items[idx] = value;
                Ok(())
            } else {
                Err(PatchError::addressing(
                    path,
                    format!("index {idx} out of bounds (len {})", items.len()),
                ))
            }
        }
        other => {
            let kind = json_kind(other);
            Err(PatchError::addressing(
                path,
                format!("cannot assign into {kind}"),
            ))
        }
    }
}

/// Remove the value at `path`, returning it. Object keys are deleted,
/// array elements are spliced out.
pub fn take(root: &mut Value, path: &str) -> Result<Value, PatchError> {
    let segs = segments(path);
    let Some((last, parents)) = segs.split_last() else {
        return Err(PatchError::addressing(path, "empty path"));
    };
    let parent_path = parents.join(".");
    let parent = if parent_path.is_empty() {
        root
    } else {
        get_mut(root, &parent_path)
            .ok_or_else(|| PatchError::addressing(path, "parent does not resolve"))?
    };
    match parent {
        Value::Object(map) => map
            .remove(*last)
            .ok_or_else(|| PatchError::addressing(path, format!("missing key '{last}'"))),
        Value::Array(items) => {
            let idx = as_index(last)
                .ok_or_else(|| PatchError::addressing(path, format!("'{last}' is not an index")))?;
            if idx < items.len() {
                Ok(items.remove(idx))
            } else {
                Err(PatchError::addressing(
                    path,
                    format!("index {idx} out of bounds (len {})", items.len()),
                ))
            }
        }
        other => {
            let kind = json_kind(other);
            Err(PatchError::addressing(
                path,
                format!("cannot remove from {kind}"),
            ))
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

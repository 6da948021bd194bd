//! The patch algebra.
//!
//! Every mutation of a schema instance is a [`SchemaPatch`]: one
//! operation, one dotted path, one operation-specific value. Agents,
//! actions and user events all speak this single shape.

mod engine;

pub use engine::{apply_batch, BatchOutcome};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The operation of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOp {
    /// Replace the value at `path` (scalar, record or variant-typed node).
    Set,
    /// Append to the sequence at `path`, or create a missing subtree.
    Add,
    /// Remove from the sequence at `path` by predicate `{key, value}`.
    Remove,
    /// Insert item(s) at the end of the list; templates in the payload are
    /// expanded against the pre-patch schema.
    AppendToList,
    /// Insert item(s) at the front of the list.
    PrependToList,
    /// `{key, value, updates}`: shallow-merge `updates` into every item
    /// whose `item[key]` string-matches `value`.
    UpdateListItem,
    /// `{key, value, index?}`: remove the first matching item, or every
    /// match when `index == -1`.
    RemoveFromList,
    /// Drop the last element of the sequence (no-op when empty).
    RemoveLast,
    /// Shallow-merge a record into the mapping at `path`.
    Merge,
    /// Add the numeric delta in `value` (default 1) to the scalar at `path`.
    Increment,
    /// Subtract the numeric delta in `value` (default 1).
    Decrement,
    /// Flip the boolean at `path` (missing reads as `false`).
    Toggle,
    /// Blank every key in `state.params`; `path` and `value` are ignored.
    ClearAllParams,
    /// `{key, operator, value}`: remove every item the predicate
    /// matches, keeping the complement.
    FilterList,
}

/// One mutation: `{op, path, value}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaPatch {
    pub op: PatchOp,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

impl SchemaPatch {
    pub fn new(op: PatchOp, path: impl Into<String>, value: Value) -> Self {
        Self {
            op,
            path: path.into(),
            value,
        }
    }

    pub fn set(path: impl Into<String>, value: Value) -> Self {
        Self::new(PatchOp::Set, path, value)
    }

    /// Structural patches cannot be expressed as a flat dotted-path write
    /// on the browser side (the target path may not have existed before),
    /// so the delivery layer ships a full `schema_update` after them.
    pub fn is_structural(&self) -> bool {
        match self.op {
            PatchOp::Add | PatchOp::Remove => true,
            _ => {
                let p = self.path.as_str();
                p == "blocks"
                    || p == "actions"
                    || p.starts_with("blocks.")
                    || p.starts_with("actions.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn op_spelling_is_snake_case() {
        let p: SchemaPatch = serde_json::from_value(json!({
            "op": "append_to_list", "path": "state.params.xs", "value": {"items": [1]}
        }))
        .unwrap();
        assert_eq!(p.op, PatchOp::AppendToList);
        assert_eq!(
            serde_json::to_value(&p).unwrap()["op"],
            json!("append_to_list")
        );
    }

    #[test]
    fn value_defaults_to_null() {
        let p: SchemaPatch =
            serde_json::from_value(json!({"op": "toggle", "path": "state.params.on"})).unwrap();
        assert_eq!(p.value, Value::Null);
    }

    #[test]
    fn structural_classification() {
        assert!(SchemaPatch::new(PatchOp::Add, "blocks", json!({})).is_structural());
        assert!(SchemaPatch::set("blocks.0.props.fields", json!([])).is_structural());
        assert!(SchemaPatch::new(PatchOp::Remove, "state.params.xs", json!({})).is_structural());
        assert!(!SchemaPatch::set("state.params.counter", json!(1)).is_structural());
        assert!(!SchemaPatch::new(PatchOp::Increment, "state.params.n", json!(1)).is_structural());
    }
}

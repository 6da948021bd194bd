//! The UI schema data model.
//!
//! A `UiSchema` is the full JSON-serializable description of one page:
//! state bags, layout, an ordered block tree and instance-global actions.
//! The server's copy is authoritative; browsers only render what they are
//! sent.

mod action;
mod block;
mod column;
mod field;

pub use action::{ActionConfig, ActionKind, ActionStyle, ApiActionConfig};
pub use block::{Block, BlockProps};
pub use column::{
    CellComponent, CellComponentKind, ColumnAlign, ColumnConfig, EditType, RenderType,
};
pub use field::{
    BaseField, ComponentField, Field, FieldCommon, ImageField, SelectOption, SelectableField,
    TableField, BASE_FIELD_TYPES,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    #[default]
    Single,
    Grid,
    Flex,
    Tabs,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(rename = "type", default)]
    pub layout_type: LayoutType,
    #[serde(default)]
    pub columns: Option<u32>,
    #[serde(default)]
    pub gap: Option<Value>,
}

/// The two string-keyed state bags of an instance.
///
/// `params` is business state mirrored by fields; `runtime` holds derived
/// and transient values (timestamps, messages, error flags).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaState {
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub runtime: Map<String, Value>,
}

/// The root record of one UI instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiSchema {
    #[serde(default)]
    pub page_key: String,
    #[serde(default)]
    pub state: SchemaState,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

impl UiSchema {
    pub fn new(page_key: impl Into<String>) -> Self {
        Self {
            page_key: page_key.into(),
            ..Default::default()
        }
    }

    /// Serialize to the working document form the path resolver and patch
    /// engine operate on. Options serialize as explicit nulls so every
    /// addressable attribute is present in the document.
    pub fn to_doc(&self) -> Value {
        serde_json::to_value(self).expect("schema serializes")
    }

    /// Validate a working document back into the typed model. This is
    /// where raw field records get dispatched into the right variant; a
    /// failure here is a shape error.
    pub fn from_doc(doc: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(doc)
    }

    /// Position of a block by id.
    pub fn block_index(&self, block_id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == block_id)
    }

    /// Action lookup used by the event pipeline: the addressed block's
    /// local actions first (when a block id is given), then the
    /// instance-global actions.
    pub fn find_action(&self, action_id: &str, block_id: Option<&str>) -> Option<&ActionConfig> {
        if let Some(bid) = block_id {
            if let Some(block) = self.blocks.iter().find(|b| b.id == bid) {
                if let Some(action) = block.find_action(action_id) {
                    return Some(action);
                }
            }
        }
        self.actions.iter().find(|a| a.id == action_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> UiSchema {
        serde_json::from_value(json!({
            "page_key": "users",
            "state": {"params": {"name": ""}, "runtime": {}},
            "layout": {"type": "grid", "columns": 2},
            "blocks": [{
                "id": "form",
                "props": {
                    "fields": [{"type": "text", "key": "name", "label": "Name"}],
                    "actions": [{"id": "local_save", "label": "Save"}]
                }
            }],
            "actions": [{"id": "global_reset", "label": "Reset"}]
        }))
        .unwrap()
    }

    #[test]
    fn doc_round_trip_preserves_schema() {
        let s = sample();
        let doc = s.to_doc();
        assert_eq!(doc["layout"]["type"], json!("grid"));
        // Optional attributes are present as null in the document form.
        assert!(doc["blocks"][0].get("title").is_some());
        let back = UiSchema::from_doc(doc).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn action_lookup_prefers_the_addressed_block() {
        let s = sample();
        assert!(s.find_action("local_save", Some("form")).is_some());
        assert!(s.find_action("global_reset", Some("form")).is_some());
        assert!(s.find_action("local_save", None).is_none());
        assert!(s.find_action("missing", Some("form")).is_none());
    }
}

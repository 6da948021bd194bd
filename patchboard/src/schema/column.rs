//! Table column configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field::SelectOption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// How a cell renders its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    Text,
    Tag,
    Badge,
    Progress,
    Image,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditType {
    #[default]
    Text,
    Number,
    Select,
}

/// One in-cell widget for a `mixed` column.
///
/// Extra attributes (progress color, image fit, ...) ride along untyped in
/// `extra`; the browser widget owns their meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellComponent {
    #[serde(rename = "type")]
    pub kind: CellComponentKind,
    #[serde(rename = "actionId", alias = "action_id", default)]
    pub action_id: Option<String>,
    #[serde(rename = "buttonLabel", alias = "button_label", default)]
    pub button_label: Option<String>,
    #[serde(rename = "buttonStyle", alias = "button_style", default)]
    pub button_style: Option<String>,
    #[serde(rename = "confirmMessage", alias = "confirm_message", default)]
    pub confirm_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellComponentKind {
    Text,
    Tag,
    Badge,
    Progress,
    Image,
    Button,
    Spacer,
}

/// Configuration for one table column.
///
/// A row record that lacks this column's `key` renders the cell empty;
/// that is the browser contract, not an error here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub align: ColumnAlign,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(rename = "renderType", alias = "render_type", default)]
    pub render_type: Option<RenderType>,
    #[serde(rename = "tagType", alias = "tag_type", default)]
    pub tag_type: Option<String>,
    #[serde(rename = "badgeColor", alias = "badge_color", default)]
    pub badge_color: Option<String>,
    /// Ordered in-cell widgets, only meaningful for `renderType: mixed`.
    #[serde(default)]
    pub components: Option<Vec<CellComponent>>,
    #[serde(default)]
    pub editable: bool,
    #[serde(rename = "editType", alias = "edit_type", default)]
    pub edit_type: EditType,
    #[serde(default)]
    pub options: Option<Vec<SelectOption>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_column_gets_defaults() {
        let c: ColumnConfig = serde_json::from_value(json!({"key": "name", "title": "Name"})).unwrap();
        assert_eq!(c.align, ColumnAlign::Left);
        assert_eq!(c.edit_type, EditType::Text);
        assert!(!c.sortable);
        assert!(c.render_type.is_none());
    }

    #[test]
    fn mixed_column_carries_components() {
        let c: ColumnConfig = serde_json::from_value(json!({
            "key": "ops", "title": "Ops", "renderType": "mixed",
            "components": [
                {"type": "button", "actionId": "delete_row", "buttonLabel": "Delete",
                 "confirmMessage": "Sure?"},
                {"type": "spacer", "width": 8}
            ]
        }))
        .unwrap();
        assert_eq!(c.render_type, Some(RenderType::Mixed));
        let comps = c.components.as_ref().unwrap();
        assert_eq!(comps[0].kind, CellComponentKind::Button);
        assert_eq!(comps[0].action_id.as_deref(), Some("delete_row"));
        assert_eq!(comps[1].extra["width"], json!(8));
    }

    #[test]
    fn snake_case_aliases_accepted_camel_emitted() {
        let c: ColumnConfig = serde_json::from_value(json!({
            "key": "s", "title": "S", "render_type": "badge", "badge_color": "green"
        }))
        .unwrap();
        assert_eq!(c.render_type, Some(RenderType::Badge));
        let wire = serde_json::to_value(&c).unwrap();
        assert_eq!(wire["renderType"], json!("badge"));
        assert_eq!(wire["badgeColor"], json!("green"));
    }
}

//! Field variants.
//!
//! A field is a tagged variant discriminated by its `type` string. Raw
//! records coming in through patches are dispatched on that discriminant
//! before structural validation, so an unknown or missing `type` is a
//! shape error rather than a half-populated record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::block::Block;
use super::column::ColumnConfig;

/// The `type` strings accepted by the [`Field::Base`] variant.
pub const BASE_FIELD_TYPES: &[&str] = &[
    "text", "number", "textarea", "date", "datetime", "file", "html", "json", "modal",
];

/// Attributes shared by every field variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCommon {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub label: String,
    pub key: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
}

fn default_true() -> bool {
    true
}

/// One choice in a select / radio / multiselect field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseField {
    #[serde(flatten)]
    pub common: FieldCommon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectableField {
    #[serde(flatten)]
    pub common: FieldCommon,
    /// Defaults to empty rather than failing: agents routinely create the
    /// field first and patch the options in afterwards.
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageField {
    #[serde(flatten)]
    pub common: FieldCommon,
    #[serde(default)]
    pub fit: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default)]
    pub download: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableField {
    #[serde(flatten)]
    pub common: FieldCommon,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(rename = "rowKey", alias = "row_key", default = "default_row_key")]
    pub row_key: String,
    #[serde(default)]
    pub bordered: bool,
    #[serde(default)]
    pub striped: bool,
    #[serde(default)]
    pub hover: bool,
    #[serde(
        rename = "showPagination",
        alias = "show_pagination",
        default = "default_true"
    )]
    pub show_pagination: bool,
    #[serde(rename = "pageSize", alias = "page_size", default = "default_page_size")]
    pub page_size: u32,
    #[serde(rename = "editableRows", alias = "editable_rows", default)]
    pub editable_rows: bool,
}

fn default_row_key() -> String {
    "id".to_string()
}

fn default_page_size() -> u32 {
    10
}

/// An embedded block, rendered inline as a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentField {
    #[serde(flatten)]
    pub common: FieldCommon,
    pub block: Box<Block>,
}

/// A leaf UI element bound to a key under `state.params`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Field {
    Selectable(SelectableField),
    Image(ImageField),
    Table(TableField),
    Component(ComponentField),
    Base(BaseField),
}

impl Field {
    pub fn common(&self) -> &FieldCommon {
        match self {
            Field::Base(f) => &f.common,
            Field::Selectable(f) => &f.common,
            Field::Image(f) => &f.common,
            Field::Table(f) => &f.common,
            Field::Component(f) => &f.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut FieldCommon {
        match self {
            Field::Base(f) => &mut f.common,
            Field::Selectable(f) => &mut f.common,
            Field::Image(f) => &mut f.common,
            Field::Table(f) => &mut f.common,
            Field::Component(f) => &mut f.common,
        }
    }

    /// The `state.params` key this field mirrors.
    pub fn key(&self) -> &str {
        &self.common().key
    }

    pub fn field_type(&self) -> &str {
        &self.common().field_type
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let raw = Value::deserialize(deserializer)?;
        let ty = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::custom("field record is missing its 'type' discriminant"))?
            .to_string();

        let parsed = match ty.as_str() {
            "select" | "radio" | "multiselect" => {
                serde_json::from_value(raw).map(Field::Selectable)
            }
            "image" => serde_json::from_value(raw).map(Field::Image),
            "table" => serde_json::from_value(raw).map(Field::Table),
            "component" => serde_json::from_value(raw).map(Field::Component),
            t if BASE_FIELD_TYPES.contains(&t) => serde_json::from_value(raw).map(Field::Base),
            other => {
                return Err(D::Error::custom(format!("unknown field type '{other}'")));
            }
        };
        parsed.map_err(|e| D::Error::custom(format!("invalid '{ty}' field: {e}")))
    }
}

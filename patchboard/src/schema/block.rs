//! Blocks: the layout units of a page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::ActionConfig;
use super::field::Field;

/// The per-layout property bag of a block.
///
/// `fields` and `actions` are the structured parts; `tabs`, `cols`/`gap`
/// and `panels` are layout-specific and pass through untyped to the
/// browser widget.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockProps {
    #[serde(default)]
    pub fields: Option<Vec<Field>>,
    #[serde(default)]
    pub actions: Option<Vec<ActionConfig>>,
    #[serde(default)]
    pub tabs: Option<Value>,
    #[serde(default)]
    pub cols: Option<u32>,
    #[serde(default)]
    pub gap: Option<Value>,
    #[serde(default)]
    pub panels: Option<Value>,
}

/// A layout unit inside a schema containing fields and optional local
/// actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub props: BlockProps,
}

impl Block {
    /// Keys of all fields in this block, in declaration order.
    pub fn field_keys(&self) -> Vec<String> {
        self.props
            .fields
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|f| f.key().to_string())
            .collect()
    }

    pub fn find_action(&self, action_id: &str) -> Option<&ActionConfig> {
        self.props
            .actions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|a| a.id == action_id)
    }
}

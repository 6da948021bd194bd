//! Action configuration.
//!
//! An action is a named operation that produces a patch batch when fired,
//! navigates between instances, or calls out to an external HTTP endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::patch::SchemaPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStyle {
    #[default]
    Primary,
    Secondary,
    Danger,
    Warning,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    ApplyPatch,
    Navigate,
    NavigateBlock,
    Api,
}

/// Configuration for one external HTTP call (`action_type: api`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiActionConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// `state.runtime` key -> dotted path into the response body.
    #[serde(default)]
    pub response_mapping: Option<Map<String, Value>>,
    /// `state.runtime` key -> literal value written on failure.
    #[serde(default)]
    pub error_mapping: Option<Map<String, Value>>,
}

fn default_method() -> String {
    "POST".to_string()
}

/// A named operation producing a patch batch on activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub style: ActionStyle,
    #[serde(default)]
    pub action_type: ActionKind,
    /// Patch bodies may contain unresolved `${...}` templates; they are
    /// expanded against the schema at fire time, not at definition time.
    #[serde(default)]
    pub patches: Vec<SchemaPatch>,
    #[serde(default)]
    pub target_instance: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub api: Option<ApiActionConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_to_apply_patch() {
        let a: ActionConfig = serde_json::from_value(json!({
            "id": "save", "label": "Save",
            "patches": [{"op": "set", "path": "state.runtime.saved", "value": true}]
        }))
        .unwrap();
        assert_eq!(a.action_type, ActionKind::ApplyPatch);
        assert_eq!(a.style, ActionStyle::Primary);
        assert_eq!(a.patches.len(), 1);
        assert!(!a.disabled);
    }

    #[test]
    fn navigate_action_round_trips() {
        let a: ActionConfig = serde_json::from_value(json!({
            "id": "to_b", "label": "Go", "action_type": "navigate",
            "style": "danger", "target_instance": "B"
        }))
        .unwrap();
        assert_eq!(a.action_type, ActionKind::Navigate);
        assert_eq!(a.target_instance.as_deref(), Some("B"));
        let wire = serde_json::to_value(&a).unwrap();
        assert_eq!(wire["action_type"], json!("navigate"));
        assert_eq!(wire["style"], json!("danger"));
    }

    #[test]
    fn api_action_carries_mappings() {
        let a: ActionConfig = serde_json::from_value(json!({
            "id": "fetch", "action_type": "api",
            "api": {
                "url": "https://example.test/users",
                "timeout_secs": 5,
                "response_mapping": {"users_loaded": "count"},
                "error_mapping": {"error": "fetch failed", "status": "error"}
            }
        }))
        .unwrap();
        let api = a.api.unwrap();
        assert_eq!(api.method, "POST");
        assert_eq!(api.timeout_secs, Some(5));
        assert!(api.error_mapping.is_some());
    }
}

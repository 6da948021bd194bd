//! Outbound messages to subscribers.
//!
//! Three shapes leave the server. Scalar edits ship as `patch`; after a
//! structural edit the target path may not have existed on the client
//! before, so the server ships the whole schema as `schema_update`
//! instead of inventing synthetic paths. `switch_instance` is
//! agent-initiated navigation.

use serde::Serialize;
use serde_json::Value;

use crate::patch::SchemaPatch;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Patch {
        instance: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        patch_id: Option<u64>,
        patch: SchemaPatch,
    },
    SchemaUpdate {
        instance: String,
        schema: Value,
    },
    SwitchInstance {
        instance: String,
        schema: Value,
    },
}

impl OutboundMessage {
    pub fn patch(instance: impl Into<String>, patch_id: Option<u64>, patch: SchemaPatch) -> Self {
        Self::Patch {
            instance: instance.into(),
            patch_id,
            patch,
        }
    }

    pub fn schema_update(instance: impl Into<String>, schema: Value) -> Self {
        Self::SchemaUpdate {
            instance: instance.into(),
            schema,
        }
    }

    pub fn switch_instance(instance: impl Into<String>, schema: Value) -> Self {
        Self::SwitchInstance {
            instance: instance.into(),
            schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shapes_match_the_browser_contract() {
        let m = OutboundMessage::patch(
            "a",
            Some(7),
            SchemaPatch::set("state.params.x", json!(1)),
        );
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["type"], json!("patch"));
        assert_eq!(v["instance"], json!("a"));
        assert_eq!(v["patch_id"], json!(7));
        assert_eq!(v["patch"]["op"], json!("set"));

        let m = OutboundMessage::schema_update("a", json!({"page_key": "a"}));
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["type"], json!("schema_update"));
        assert_eq!(v["schema"]["page_key"], json!("a"));

        let m = OutboundMessage::switch_instance("b", json!({}));
        assert_eq!(
            serde_json::to_value(&m).unwrap()["type"],
            json!("switch_instance")
        );
    }

    #[test]
    fn patch_id_is_omitted_when_absent() {
        let m = OutboundMessage::patch("a", None, SchemaPatch::set("state.params.x", json!(1)));
        let v = serde_json::to_value(&m).unwrap();
        assert!(v.get("patch_id").is_none());
    }
}

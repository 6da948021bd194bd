//! The per-instance event pipeline.
//!
//! User events arrive as `{type, payload, pageKey}` and are translated
//! into patch batches: a `field_change` is a direct state write, an
//! `action_click` fires the named action's patches after template
//! expansion, and a `table_button_click` first parks the clicked row
//! under `state.params.temp_rowData` so templates can reach it.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::RuntimeError;
use crate::patch::{PatchOp, SchemaPatch};
use crate::runtime::Runtime;
use crate::schema::{ActionConfig, ActionKind, ApiActionConfig};
use crate::template;

/// An inbound user event.
///
/// Both the colon spelling the browser emits (`field:change`) and the
/// underscore spelling (`field_change`) are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct UiEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: EventPayload,
    #[serde(rename = "pageKey", alias = "page_key", default)]
    pub page_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "actionId", alias = "action_id", default)]
    pub action_id: Option<String>,
    #[serde(rename = "fieldKey", alias = "field_key", default)]
    pub field_key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    /// Extra params merged into `state.params` before action resolution.
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
    #[serde(rename = "blockId", alias = "block_id", default)]
    pub block_id: Option<String>,
    /// The clicked row record, for `table_button_click`.
    #[serde(rename = "temp_rowData", alias = "tempRowData", default)]
    pub temp_row_data: Option<Value>,
    #[serde(rename = "rowKey", alias = "row_key", default)]
    pub row_key: Option<Value>,
}

/// What the pipeline did with an event.
#[derive(Debug, Default)]
pub struct EventOutcome {
    /// `(history id, patch)` for everything that was applied.
    pub applied: Vec<(u64, SchemaPatch)>,
    /// Set for `navigate` actions; no state was touched.
    pub navigate_to: Option<String>,
    /// Human-readable note (action not found, action disabled).
    pub message: Option<String>,
    /// A pending external HTTP call the caller must hand to the
    /// executor after releasing the runtime lock.
    pub api_call: Option<ApiActionConfig>,
}

impl EventOutcome {
    pub fn last_patch_id(&self) -> Option<u64> {
        self.applied.last().map(|(id, _)| *id)
    }
}

/// Translate one event into patches and apply them.
pub fn handle_event(rt: &mut Runtime, event: &UiEvent) -> Result<EventOutcome, RuntimeError> {
    let instance = rt
        .resolve_instance(event.page_key.as_deref())
        .to_string();
    // Fail early on unknown instances.
    rt.schema(&instance)?;

    match event.event_type.replace(':', "_").as_str() {
        "field_change" => handle_field_change(rt, &instance, event),
        "action_click" => handle_action(rt, &instance, event),
        "table_button_click" => {
            park_row_payload(rt, &instance, event)?;
            handle_action(rt, &instance, event)
        }
        other => {
            warn!(event_type = %other, "ignoring unknown event type");
            Ok(EventOutcome {
                message: Some(format!("unknown event type '{other}'")),
                ..Default::default()
            })
        }
    }
}

/// A direct state write; no template expansion on the value.
fn handle_field_change(
    rt: &mut Runtime,
    instance: &str,
    event: &UiEvent,
) -> Result<EventOutcome, RuntimeError> {
    let field_key = event
        .payload
        .field_key
        .as_deref()
        .ok_or_else(|| RuntimeError::InvalidRequest("field_change needs fieldKey".into()))?;
    let value = event.payload.value.clone().unwrap_or(Value::Null);

    let report = rt.apply_and_deliver(
        instance,
        &[SchemaPatch::set(format!("state.params.{field_key}"), value)],
    )?;
    Ok(EventOutcome {
        applied: report.applied,
        ..Default::default()
    })
}

/// Park the clicked row (and any extra params) in `state.params` before
/// the action's templates run. This is a scratch write, not part of the
/// instance's patch history.
fn park_row_payload(rt: &mut Runtime, instance: &str, event: &UiEvent) -> Result<(), RuntimeError> {
    let schema = rt
        .store
        .get_mut(instance)
        .ok_or_else(|| RuntimeError::UnknownInstance {
            instance: instance.to_string(),
        })?;
    if let Some(row) = &event.payload.temp_row_data {
        schema
            .state
            .params
            .insert("temp_rowData".to_string(), row.clone());
    }
    if let Some(key) = &event.payload.row_key {
        schema
            .state
            .params
            .insert("temp_rowKey".to_string(), key.clone());
    }
    if let Some(extra) = &event.payload.params {
        for (k, v) in extra {
            schema.state.params.insert(k.clone(), v.clone());
        }
    }
    Ok(())
}

fn handle_action(
    rt: &mut Runtime,
    instance: &str,
    event: &UiEvent,
) -> Result<EventOutcome, RuntimeError> {
    let action_id = event
        .payload
        .action_id
        .as_deref()
        .ok_or_else(|| RuntimeError::InvalidRequest("action event needs actionId".into()))?;

    let schema = rt.schema(instance)?;
    let action: Option<ActionConfig> = schema
        .find_action(action_id, event.payload.block_id.as_deref())
        .cloned();

    let Some(action) = action else {
        warn!(%instance, %action_id, "action not found; ignoring");
        return Ok(EventOutcome {
            message: Some(format!("action '{action_id}' not found")),
            ..Default::default()
        });
    };
    if action.disabled {
        debug!(%instance, %action_id, "action disabled; ignoring");
        return Ok(EventOutcome {
            message: Some(format!("action '{action_id}' is disabled")),
            ..Default::default()
        });
    }

    match action.action_type {
        ActionKind::Navigate => {
            // Navigation leaves this instance untouched; no subscriber
            // message is emitted against it.
            let target = action.target_instance.clone().unwrap_or_default();
            debug!(%instance, %action_id, target = %target, "navigate action");
            Ok(EventOutcome {
                navigate_to: Some(target),
                ..Default::default()
            })
        }
        ActionKind::NavigateBlock => {
            let target = action
                .target_instance
                .clone()
                .or_else(|| event.payload.block_id.clone())
                .unwrap_or_default();
            let report = rt.apply_and_deliver(
                instance,
                &[SchemaPatch::set("state.runtime.active_block", Value::String(target))],
            )?;
            Ok(EventOutcome {
                applied: report.applied,
                ..Default::default()
            })
        }
        ActionKind::Api => {
            let report = if action.patches.is_empty() {
                None
            } else {
                Some(apply_action_patches(rt, instance, &action)?)
            };
            Ok(EventOutcome {
                applied: report.map(|r| r.applied).unwrap_or_default(),
                api_call: action.api.clone(),
                ..Default::default()
            })
        }
        ActionKind::ApplyPatch => {
            let report = apply_action_patches(rt, instance, &action)?;
            Ok(EventOutcome {
                applied: report.applied,
                ..Default::default()
            })
        }
    }
}

/// Expand the action's patch values against the current schema snapshot
/// and run them through the engine. List and merge payloads are left to
/// the engine, which expands them itself; expanding them here too would
/// defeat the `\${` escape.
fn apply_action_patches(
    rt: &mut Runtime,
    instance: &str,
    action: &ActionConfig,
) -> Result<crate::runtime::ApplyReport, RuntimeError> {
    let snapshot = rt.schema(instance)?.to_doc();
    let patches: Vec<SchemaPatch> = action
        .patches
        .iter()
        .map(|p| {
            let engine_expands = matches!(
                p.op,
                PatchOp::AppendToList
                    | PatchOp::PrependToList
                    | PatchOp::UpdateListItem
                    | PatchOp::RemoveFromList
                    | PatchOp::FilterList
                    | PatchOp::Merge
            );
            if engine_expands {
                p.clone()
            } else {
                SchemaPatch::new(p.op, &p.path, template::expand_value(&snapshot, &p.value))
            }
        })
        .collect();
    rt.apply_and_deliver(instance, &patches)
}

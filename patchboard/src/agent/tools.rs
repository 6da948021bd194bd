//! Tool handlers for the agent surface.
//!
//! Every call returns a structured `{status: success|error, ...}` body;
//! domain failures (unknown instance, malformed patches) come back as
//! data, never as a transport error.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::patch::{PatchOp, SchemaPatch};
use crate::runtime::{PatchCallResult, Runtime, SharedRuntime};

use super::completion::{self, Criterion};
use super::protocol::{Tool, ToolCallResult};

pub struct ToolHandlers {
    runtime: SharedRuntime,
}

impl ToolHandlers {
    pub fn new(runtime: SharedRuntime) -> Self {
        Self { runtime }
    }

    /// Handle a tool call by name.
    pub async fn handle(&self, name: &str, args: Value) -> ToolCallResult {
        match self.dispatch(name, args).await {
            Ok(v) => ToolCallResult::json(&v),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<Value> {
        match name {
            "get_schema" => self.get_schema(args).await,
            "list_instances" => self.list_instances().await,
            "patch_ui_state" => self.patch_ui_state(args).await,
            "access_instance" => self.access_instance(args).await,
            "validate_completion" => self.validate_completion(args).await,
            "add_field" => self.add_field(args).await,
            "remove_field" => self.remove_field(args).await,
            "add_block" => self.add_block(args).await,
            "remove_block" => self.remove_block(args).await,
            "add_action" => self.add_action(args).await,
            _ => Err(anyhow!("Unknown tool: {}", name)),
        }
    }

    /// Current schema of an instance (defaults to the active one).
    async fn get_schema(&self, args: Value) -> Result<Value> {
        let rt = self.runtime.read().await;
        let instance = rt
            .resolve_instance(args["instance_id"].as_str())
            .to_string();
        match rt.schema(&instance) {
            Ok(schema) => Ok(json!({
                "status": "success",
                "instance_id": instance,
                "schema": schema.to_doc(),
            })),
            Err(_) => Ok(unknown_instance_body(&rt, &instance)),
        }
    }

    async fn list_instances(&self) -> Result<Value> {
        let rt = self.runtime.read().await;
        let instances = rt.store.summaries();
        Ok(json!({
            "status": "success",
            "instances": instances,
            "total": rt.store.len(),
            "active_instance": rt.active_instance(),
        }))
    }

    /// The uniform modifying call, including `__CREATE__` / `__DELETE__`.
    async fn patch_ui_state(&self, args: Value) -> Result<Value> {
        let instance_id = args["instance_id"]
            .as_str()
            .ok_or_else(|| anyhow!("instance_id required"))?
            .to_string();
        let patches: Vec<SchemaPatch> =
            serde_json::from_value(args.get("patches").cloned().unwrap_or(json!([])))
                .map_err(|e| anyhow!("invalid patches: {}", e))?;
        let new_instance_id = args["new_instance_id"].as_str().map(str::to_string);
        let target_instance_id = args["target_instance_id"].as_str().map(str::to_string);

        let mut rt = self.runtime.write().await;
        apply_entry(
            &mut rt,
            &instance_id,
            &patches,
            new_instance_id.as_deref(),
            target_instance_id.as_deref(),
        )
    }

    /// Mark an instance active and broadcast `switch_instance`.
    async fn access_instance(&self, args: Value) -> Result<Value> {
        let instance = args["instance_id"]
            .as_str()
            .ok_or_else(|| anyhow!("instance_id required"))?
            .to_string();
        let mut rt = self.runtime.write().await;
        match rt.access(&instance) {
            Ok(schema) => Ok(json!({
                "status": "success",
                "instance_id": instance,
                "schema": schema,
            })),
            Err(_) => Ok(unknown_instance_body(&rt, &instance)),
        }
    }

    async fn validate_completion(&self, args: Value) -> Result<Value> {
        let criteria: Vec<Criterion> =
            serde_json::from_value(args.get("criteria").cloned().unwrap_or(json!([])))
                .map_err(|e| anyhow!("invalid criteria: {}", e))?;
        let intent = args["intent"].as_str().unwrap_or("").to_string();

        let rt = self.runtime.read().await;
        let instance = rt
            .resolve_instance(args["instance_id"].as_str())
            .to_string();
        match rt.schema(&instance) {
            Ok(schema) => {
                let mut body = completion::evaluate(schema, &intent, &criteria);
                body["status"] = json!("success");
                body["instance_id"] = json!(instance);
                Ok(body)
            }
            Err(_) => Ok(unknown_instance_body(&rt, &instance)),
        }
    }

    // ------------------------------------------------------------------
    // Convenience tools: thin sugar that lowers to patch batches.
    // ------------------------------------------------------------------

    async fn add_field(&self, args: Value) -> Result<Value> {
        let block_id = args["block_id"]
            .as_str()
            .ok_or_else(|| anyhow!("block_id required"))?
            .to_string();
        let field = args
            .get("field")
            .cloned()
            .ok_or_else(|| anyhow!("field required"))?;

        let mut rt = self.runtime.write().await;
        let instance = rt
            .resolve_instance(args["instance_id"].as_str())
            .to_string();
        let Some(n) = block_position(&rt, &instance, &block_id)? else {
            return Ok(json!({
                "status": "error",
                "error": format!("block '{block_id}' not found in '{instance}'"),
            }));
        };
        let patch = SchemaPatch::new(PatchOp::Add, format!("blocks.{n}.props.fields"), field);
        apply_entry(&mut rt, &instance, &[patch], None, None)
    }

    async fn remove_field(&self, args: Value) -> Result<Value> {
        let block_id = args["block_id"]
            .as_str()
            .ok_or_else(|| anyhow!("block_id required"))?
            .to_string();
        let field_key = args["field_key"]
            .as_str()
            .ok_or_else(|| anyhow!("field_key required"))?
            .to_string();

        let mut rt = self.runtime.write().await;
        let instance = rt
            .resolve_instance(args["instance_id"].as_str())
            .to_string();
        let Some(n) = block_position(&rt, &instance, &block_id)? else {
            return Ok(json!({
                "status": "error",
                "error": format!("block '{block_id}' not found in '{instance}'"),
            }));
        };
        let patch = SchemaPatch::new(
            PatchOp::Remove,
            format!("blocks.{n}.props.fields"),
            json!({"key": "key", "value": field_key}),
        );
        apply_entry(&mut rt, &instance, &[patch], None, None)
    }

    async fn add_block(&self, args: Value) -> Result<Value> {
        let block = args
            .get("block")
            .cloned()
            .ok_or_else(|| anyhow!("block required"))?;
        let mut rt = self.runtime.write().await;
        let instance = rt
            .resolve_instance(args["instance_id"].as_str())
            .to_string();
        let patch = SchemaPatch::new(PatchOp::Add, "blocks", block);
        apply_entry(&mut rt, &instance, &[patch], None, None)
    }

    async fn remove_block(&self, args: Value) -> Result<Value> {
        let block_id = args["block_id"]
            .as_str()
            .ok_or_else(|| anyhow!("block_id required"))?
            .to_string();
        let mut rt = self.runtime.write().await;
        let instance = rt
            .resolve_instance(args["instance_id"].as_str())
            .to_string();
        let patch = SchemaPatch::new(
            PatchOp::Remove,
            "blocks",
            json!({"key": "id", "value": block_id}),
        );
        apply_entry(&mut rt, &instance, &[patch], None, None)
    }

    async fn add_action(&self, args: Value) -> Result<Value> {
        let action = args
            .get("action")
            .cloned()
            .ok_or_else(|| anyhow!("action required"))?;
        let mut rt = self.runtime.write().await;
        let instance = rt
            .resolve_instance(args["instance_id"].as_str())
            .to_string();
        let patch = SchemaPatch::new(PatchOp::Add, "actions", action);
        apply_entry(&mut rt, &instance, &[patch], None, None)
    }
}

fn block_position(rt: &Runtime, instance: &str, block_id: &str) -> Result<Option<usize>> {
    match rt.schema(instance) {
        Ok(schema) => Ok(schema.block_index(block_id)),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Shared lowering of a modifying call into the runtime's patch entry
/// point, shaped into the uniform response body.
fn apply_entry(
    rt: &mut Runtime,
    instance_id: &str,
    patches: &[SchemaPatch],
    new_instance_id: Option<&str>,
    target_instance_id: Option<&str>,
) -> Result<Value> {
    use crate::error::RuntimeError;

    match rt.patch_entry(instance_id, patches, new_instance_id, target_instance_id) {
        Ok(PatchCallResult::Patched {
            instance_id,
            report,
        }) => Ok(json!({
            "status": "success",
            "instance_id": instance_id,
            "patches_applied": report.patches_applied(),
            "patches_skipped": report.skipped,
        })),
        Ok(PatchCallResult::Created {
            instance_id,
            patches_applied,
        }) => Ok(json!({
            "status": "success",
            "message": "instance created",
            "instance_id": instance_id,
            "patches_applied": patches_applied,
        })),
        Ok(PatchCallResult::Deleted { instance_id }) => Ok(json!({
            "status": "success",
            "message": "instance deleted",
            "instance_id": instance_id,
        })),
        Err(RuntimeError::UnknownInstance { instance }) => Ok(unknown_instance_body(rt, &instance)),
        Err(e) => Ok(json!({"status": "error", "error": e.to_string()})),
    }
}

pub(crate) fn unknown_instance_body(rt: &Runtime, instance: &str) -> Value {
    json!({
        "status": "error",
        "error": format!("unknown instance '{instance}'"),
        "available_instances": rt.store.ids(),
    })
}

/// Tool definitions advertised by `tools/list`.
pub fn tool_definitions() -> Vec<Tool> {
    fn tool(name: &str, description: &str, input_schema: Value) -> Tool {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    vec![
        tool(
            "get_schema",
            "Get the current UI schema of an instance (defaults to the active instance)",
            json!({
                "type": "object",
                "properties": {"instance_id": {"type": "string"}}
            }),
        ),
        tool(
            "list_instances",
            "List all UI instances with summaries",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            "patch_ui_state",
            "Apply schema patches to an instance. instance_id __CREATE__ creates \
             (with new_instance_id), __DELETE__ deletes (with target_instance_id)",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": {"type": "string"},
                    "patches": {"type": "array", "items": {"type": "object"}},
                    "new_instance_id": {"type": "string"},
                    "target_instance_id": {"type": "string"}
                },
                "required": ["instance_id", "patches"]
            }),
        ),
        tool(
            "access_instance",
            "Mark an instance active and switch all connected browsers to it",
            json!({
                "type": "object",
                "properties": {"instance_id": {"type": "string"}},
                "required": ["instance_id"]
            }),
        ),
        tool(
            "validate_completion",
            "Evaluate completion criteria against an instance's current schema",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": {"type": "string"},
                    "intent": {"type": "string"},
                    "criteria": {"type": "array", "items": {"type": "object"}}
                },
                "required": ["criteria"]
            }),
        ),
        tool(
            "add_field",
            "Add a field to a block (sugar over patch_ui_state)",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": {"type": "string"},
                    "block_id": {"type": "string"},
                    "field": {"type": "object"}
                },
                "required": ["block_id", "field"]
            }),
        ),
        tool(
            "remove_field",
            "Remove a field from a block by key",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": {"type": "string"},
                    "block_id": {"type": "string"},
                    "field_key": {"type": "string"}
                },
                "required": ["block_id", "field_key"]
            }),
        ),
        tool(
            "add_block",
            "Append a block to an instance",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": {"type": "string"},
                    "block": {"type": "object"}
                },
                "required": ["block"]
            }),
        ),
        tool(
            "remove_block",
            "Remove a block by id",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": {"type": "string"},
                    "block_id": {"type": "string"}
                },
                "required": ["block_id"]
            }),
        ),
        tool(
            "add_action",
            "Append an instance-global action",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": {"type": "string"},
                    "action": {"type": "object"}
                },
                "required": ["action"]
            }),
        ),
    ]
}

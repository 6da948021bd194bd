//! REST and JSON-RPC handlers.
//!
//! Error mapping: an unknown instance is `404` with the available ids,
//! a malformed request is `400`, and per-patch failures never surface
//! here at all; the engine skips them and the response body carries the
//! applied/skipped counts.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::agent::{self, JsonRpcRequest, JsonRpcResponse};
use crate::error::RuntimeError;
use crate::event::{self, UiEvent};
use crate::external;
use crate::patch::SchemaPatch;
use crate::runtime::PatchCallResult;

use super::AppState;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InstanceQuery {
    #[serde(rename = "instanceId", alias = "instance_id", default)]
    pub instance_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccessRequest {
    #[serde(alias = "instanceId")]
    pub instance_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PatchRequest {
    #[serde(alias = "instanceId")]
    pub instance_id: String,
    #[serde(default)]
    pub patches: Vec<SchemaPatch>,
    #[serde(alias = "newInstanceId", default)]
    pub new_instance_id: Option<String>,
    #[serde(alias = "targetInstanceId", default)]
    pub target_instance_id: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_schema(
    State(state): State<AppState>,
    Query(query): Query<InstanceQuery>,
) -> ApiResult {
    let rt = state.runtime.read().await;
    let instance = rt.resolve_instance(query.instance_id.as_deref()).to_string();
    let schema = rt.schema(&instance).map_err(|_| not_found(&rt, &instance))?;
    Ok(Json(json!({
        "status": "success",
        "instance_id": instance,
        "schema": schema.to_doc(),
    })))
}

pub async fn list_instances(State(state): State<AppState>) -> Json<Value> {
    let rt = state.runtime.read().await;
    Json(json!({
        "status": "success",
        "instances": rt.store.summaries(),
        "total": rt.store.len(),
        "active_instance": rt.active_instance(),
    }))
}

pub async fn access_instance(
    State(state): State<AppState>,
    Json(req): Json<AccessRequest>,
) -> ApiResult {
    let mut rt = state.runtime.write().await;
    let schema = rt
        .access(&req.instance_id)
        .map_err(|_| not_found(&rt, &req.instance_id))?;
    info!(instance = %req.instance_id, "instance activated");
    Ok(Json(json!({
        "status": "success",
        "instance_id": req.instance_id,
        "schema": schema,
    })))
}

pub async fn patch_instance(
    State(state): State<AppState>,
    Json(req): Json<PatchRequest>,
) -> ApiResult {
    let mut rt = state.runtime.write().await;
    let result = rt
        .patch_entry(
            &req.instance_id,
            &req.patches,
            req.new_instance_id.as_deref(),
            req.target_instance_id.as_deref(),
        )
        .map_err(|e| match e {
            RuntimeError::UnknownInstance { instance } => not_found(&rt, &instance),
            other => bad_request(other.to_string()),
        })?;

    let body = match result {
        PatchCallResult::Patched {
            instance_id,
            report,
        } => json!({
            "status": "success",
            "instance_id": instance_id,
            "patches_applied": report.patches_applied(),
            "patches_skipped": report.skipped,
            "patch_ids": report.applied.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        }),
        PatchCallResult::Created {
            instance_id,
            patches_applied,
        } => json!({
            "status": "success",
            "message": "instance created",
            "instance_id": instance_id,
            "patches_applied": patches_applied,
        }),
        PatchCallResult::Deleted { instance_id } => json!({
            "status": "success",
            "message": "instance deleted",
            "instance_id": instance_id,
        }),
    };
    Ok(Json(body))
}

pub async fn patch_history(
    State(state): State<AppState>,
    Query(query): Query<InstanceQuery>,
) -> ApiResult {
    let rt = state.runtime.read().await;
    let instance = rt.resolve_instance(query.instance_id.as_deref()).to_string();
    rt.schema(&instance).map_err(|_| not_found(&rt, &instance))?;
    let records = rt.history.get_all(&instance);
    Ok(Json(json!({
        "status": "success",
        "instance_id": instance,
        "patches": records,
        "total": records.len(),
    })))
}

pub async fn replay_patch(
    State(state): State<AppState>,
    Path(patch_id): Path<u64>,
    Query(query): Query<InstanceQuery>,
) -> ApiResult {
    let mut rt = state.runtime.write().await;
    let instance = rt.resolve_instance(query.instance_id.as_deref()).to_string();
    rt.schema(&instance).map_err(|_| not_found(&rt, &instance))?;
    let report = rt.replay(&instance, patch_id).map_err(|e| match e {
        RuntimeError::UnknownInstance { instance } => not_found(&rt, &instance),
        other => bad_request(other.to_string()),
    })?;
    Ok(Json(json!({
        "status": "success",
        "instance_id": instance,
        "patch_id": patch_id,
        "replayed": true,
        "patches_applied": report.patches_applied(),
        "patches_skipped": report.skipped,
    })))
}

/// The user-event pipeline. A pending api action is spawned after the
/// runtime lock is released; the HTTP response never waits on it.
pub async fn post_event(State(state): State<AppState>, Json(event): Json<UiEvent>) -> ApiResult {
    let (outcome, instance) = {
        let mut rt = state.runtime.write().await;
        let instance = rt.resolve_instance(event.page_key.as_deref()).to_string();
        let outcome = event::handle_event(&mut rt, &event).map_err(|e| match e {
            RuntimeError::UnknownInstance { instance } => not_found(&rt, &instance),
            other => bad_request(other.to_string()),
        })?;
        (outcome, instance)
    };

    if let Some(cfg) = outcome.api_call.clone() {
        tokio::spawn(external::run_api_action(
            state.runtime.clone(),
            state.executor.clone(),
            instance.clone(),
            cfg,
        ));
    }

    Ok(Json(json!({
        "status": "success",
        "instance_id": instance,
        "patches_applied": outcome.applied.len(),
        "patch_id": outcome.last_patch_id(),
        "navigate_to": outcome.navigate_to,
        "message": outcome.message,
        "api_pending": outcome.api_call.is_some(),
    })))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let rt = state.runtime.read().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "instances": rt.store.len(),
        "connections": rt.connections.total_connections(),
    }))
}

pub async fn mcp_endpoint(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    Json(agent::handle_rpc(&state.tools, request).await)
}

// ============================================================================
// Error helpers
// ============================================================================

fn not_found(rt: &crate::runtime::Runtime, instance: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "error",
            "error": format!("unknown instance '{instance}'"),
            "available_instances": rt.store.ids(),
        })),
    )
}

fn bad_request(message: String) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "error": message})),
    )
}

//! HTTP surface: REST routes for agents and tooling, a JSON-RPC
//! endpoint for tool-calling clients, and the browser WebSocket.

mod routes;
mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::agent::ToolHandlers;
use crate::external::ApiExecutor;
use crate::runtime::SharedRuntime;

#[derive(Clone)]
pub struct AppState {
    pub runtime: SharedRuntime,
    pub executor: Arc<dyn ApiExecutor>,
    pub tools: Arc<ToolHandlers>,
}

impl AppState {
    pub fn new(runtime: SharedRuntime, executor: Arc<dyn ApiExecutor>) -> Self {
        let tools = Arc::new(ToolHandlers::new(runtime.clone()));
        Self {
            runtime,
            executor,
            tools,
        }
    }
}

/// Build the full router.
///
/// - `GET  /ui/schema`              - Current schema of an instance
/// - `GET  /ui/instances`           - Instance summaries
/// - `POST /ui/access`              - Mark an instance active
/// - `POST /ui/patch`               - Apply patches (incl. create/delete)
/// - `GET  /ui/patches`             - Patch history
/// - `GET  /ui/patches/replay/:id`  - Re-apply a recorded patch
/// - `POST /ui/event`               - User event pipeline
/// - `GET  /ui/health`              - Health check
/// - `GET  /ui/ws`                  - Browser subscription socket
/// - `POST /mcp`                    - JSON-RPC tool surface
pub fn create_ui_router(state: AppState) -> Router {
    Router::new()
        .route("/ui/schema", get(routes::get_schema))
        .route("/ui/instances", get(routes::list_instances))
        .route("/ui/access", post(routes::access_instance))
        .route("/ui/patch", post(routes::patch_instance))
        .route("/ui/patches", get(routes::patch_history))
        .route("/ui/patches/replay/:patch_id", get(routes::replay_patch))
        .route("/ui/event", post(routes::post_event))
        .route("/ui/health", get(routes::health))
        .route("/ui/ws", get(ws::ws_handler))
        .route("/mcp", post(routes::mcp_endpoint))
        .with_state(state)
}

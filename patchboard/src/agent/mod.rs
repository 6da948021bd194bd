//! The agent-facing tool surface: JSON-RPC framing, tool handlers and
//! completion-criteria evaluation.

pub mod completion;
pub mod protocol;
pub mod tools;

pub use completion::Criterion;
pub use protocol::{JsonRpcRequest, JsonRpcResponse, ToolCallResult};
pub use tools::ToolHandlers;

use serde_json::json;

use protocol::{ToolCallParams, ToolsListResult, INVALID_REQUEST, METHOD_NOT_FOUND};

/// Dispatch one JSON-RPC request to the tool handlers.
pub async fn handle_rpc(handlers: &ToolHandlers, request: JsonRpcRequest) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, "jsonrpc must be \"2.0\"");
    }

    match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            request.id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {
                    "name": "patchboard",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "tools/list" => {
            let result = ToolsListResult {
                tools: tools::tool_definitions(),
            };
            match serde_json::to_value(&result) {
                Ok(v) => JsonRpcResponse::success(request.id, v),
                Err(e) => JsonRpcResponse::error(request.id, INVALID_REQUEST, e.to_string()),
            }
        }
        "tools/call" => {
            let params: ToolCallParams = match serde_json::from_value(request.params) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(
                        request.id,
                        INVALID_REQUEST,
                        format!("invalid tools/call params: {e}"),
                    )
                }
            };
            let result = handlers.handle(&params.name, params.arguments).await;
            match serde_json::to_value(&result) {
                Ok(v) => JsonRpcResponse::success(request.id, v),
                Err(e) => JsonRpcResponse::error(request.id, INVALID_REQUEST, e.to_string()),
            }
        }
        other => JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("unknown method '{other}'"),
        ),
    }
}

//! Line-framed JSON-RPC 2.0: request parsing, method routing, deadlines.
//!
//! One JSON object per line. A BOM on input is tolerated; malformed JSON is
//! a `-32700` protocol error and an unknown method a `-32601`. Tool-level
//! failures are NOT protocol errors — they come back as successful
//! `tools/call` results carrying the structured `{_meta: {error: true}}`
//! envelope, so a client can always distinguish "the wire broke" from "the
//! tool declined".

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::{envelope, ToolError};
use crate::state::CoreContext;
use crate::tools;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Handle one input line. Returns `None` for blank lines.
pub async fn handle_line(ctx: &Arc<CoreContext>, line: &str) -> Option<String> {
    let line = line.trim_start_matches('\u{feff}').trim();
    if line.is_empty() {
        return None;
    }
    let request: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(%err, "unparseable request line");
            return Some(
                json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {"code": -32700, "message": format!("Parse error: {err}")},
                })
                .to_string(),
            );
        }
    };
    Some(handle_request(ctx, request).await.to_string())
}

/// Handle one parsed request object; shared by the stdio and HTTP fronts.
pub async fn handle_request(ctx: &Arc<CoreContext>, request: Value) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // Some clients send `params: null`; treat it as empty.
    let params = match request.get("params") {
        None | Some(Value::Null) => json!({}),
        Some(params) => params.clone(),
    };

    match method.as_str() {
        "initialize" => ok(id, initialize_result()),
        "tools/list" => ok(id, json!({"tools": tools::catalogue()})),
        "tools/call" => {
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            let result = call_with_deadline(ctx.clone(), name, args).await;
            ok(id, result)
        }
        "" => rpc_error(id, -32600, "Invalid Request: missing method"),
        other => rpc_error(id, -32601, format!("Method not found: {other}")),
    }
}

/// Run one tool call on the blocking pool under the configured deadline.
/// On expiry the work is abandoned and the caller gets `reason = timeout`;
/// partial results never escape.
async fn call_with_deadline(ctx: Arc<CoreContext>, name: String, args: Value) -> Value {
    let deadline = Duration::from_secs(ctx.config.server.timeout_secs.max(1));
    let handle =
        tokio::task::spawn_blocking(move || envelope(tools::dispatch(&ctx, &name, &args)));

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(value)) => value,
        Ok(Err(join_err)) => {
            tracing::error!(%join_err, "tool handler aborted");
            ToolError::internal("tool handler aborted").to_value()
        }
        Err(_) => ToolError::timeout().to_value(),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {"tools": {"listChanged": true}},
        "serverInfo": {
            "name": "anchora",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Contextual retrieval and grounding engine",
        },
    })
}

fn ok(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message.into()},
    })
}

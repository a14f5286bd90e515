//! Error envelopes across the dispatch boundary: every failure carries a
//! structured `{_meta: {error: true, reason}}`, never a panic or a
//! success-shaped empty.

use std::sync::Arc;

use anchora::EngineConfig;
use serde_json::{json, Value};

fn ctx_with(mutate: impl FnOnce(&mut EngineConfig)) -> (tempfile::TempDir, Arc<server::CoreContext>) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.embedding.dimension = 32;
    config.embedding.model = "hash-sin-32".to_string();
    mutate(&mut config);
    let ctx = Arc::new(server::CoreContext::build(config).unwrap());
    (dir, ctx)
}

async fn call(ctx: &Arc<server::CoreContext>, tool: &str, arguments: Value) -> Value {
    let response = server::protocol::handle_request(
        ctx,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": tool, "arguments": arguments},
        }),
    )
    .await;
    response["result"].clone()
}

fn reason(result: &Value) -> &str {
    assert_eq!(result["_meta"]["error"], true, "expected an error envelope: {result}");
    result["_meta"]["reason"].as_str().unwrap()
}

#[tokio::test]
async fn unknown_session_is_session_not_found() {
    let (_guard, ctx) = ctx_with(|_| {});
    let result = call(
        &ctx,
        "get_context",
        json!({"query": "q", "session_id": "ghost"}),
    )
    .await;
    assert_eq!(reason(&result), "session_not_found");
}

#[tokio::test]
async fn deleting_a_missing_session_is_session_not_found() {
    let (_guard, ctx) = ctx_with(|_| {});
    let result = call(&ctx, "delete_session", json!({"session_id": "ghost"})).await;
    assert_eq!(reason(&result), "session_not_found");
}

#[tokio::test]
async fn disabled_indexing_reports_indexing_disabled() {
    let (_guard, ctx) = ctx_with(|config| config.indexing.enabled = false);
    let result = call(&ctx, "index_code", json!({"directory": "/tmp"})).await;
    assert_eq!(reason(&result), "indexing_disabled");

    let result = call(&ctx, "search_entity", json!({"name": "login"})).await;
    assert_eq!(reason(&result), "indexing_disabled");
}

#[tokio::test]
async fn missing_arguments_are_invalid_request() {
    let (_guard, ctx) = ctx_with(|_| {});
    let result = call(&ctx, "get_context", json!({})).await;
    assert_eq!(reason(&result), "invalid_request");

    let result = call(&ctx, "create_session", json!({})).await;
    assert_eq!(reason(&result), "invalid_request");

    let result = call(
        &ctx,
        "create_session",
        json!({"session_id": "x", "session_type": "cooking"}),
    )
    .await;
    assert_eq!(reason(&result), "invalid_request");
}

#[tokio::test]
async fn memory_traversal_is_rejected() {
    let (_guard, ctx) = ctx_with(|_| {});
    let result = call(
        &ctx,
        "memory_tool",
        json!({"command": "create", "file_path": "../../etc/shadow", "content": "x"}),
    )
    .await;
    assert_eq!(reason(&result), "invalid_request");
}

#[tokio::test]
async fn missing_memory_is_not_found() {
    let (_guard, ctx) = ctx_with(|_| {});
    let result = call(
        &ctx,
        "memory_tool",
        json!({"command": "read", "file_path": "ghost.md"}),
    )
    .await;
    assert_eq!(reason(&result), "not_found");
}

#[tokio::test]
async fn abstention_is_a_success_not_an_error() {
    let (_guard, ctx) = ctx_with(|_| {});
    let result = call(&ctx, "get_context", json!({"query": "anything"})).await;
    assert!(result["_meta"].get("error").is_none());
    assert_eq!(result["_meta"]["abstained"], true);
    assert_eq!(
        result["content"][0]["text"],
        "No sufficient information found in memory for this query."
    );
}

#[tokio::test]
async fn min_score_one_abstains_without_exact_match() {
    use store::{ChunkRecord, CompressionSpec, Container};
    use vector::{AnnIndex, Embedder, HashEmbedder};

    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.data_dir = dir.path().to_path_buf();

    let embedder = HashEmbedder::new(config.embedding.dimension);
    let vectors = embedder.embed("completely unrelated content");
    let chunks = vec![ChunkRecord::new(0, "f.py", 1, 2, None, "completely unrelated content")];
    let index = AnnIndex::build(config.embedding.dimension, &vectors, config.retrieval.ann).unwrap();
    Container::write_snapshot(
        config.container_path(),
        &chunks,
        &vectors,
        config.embedding.dimension,
        &index.serialize().unwrap(),
        embedder.model_id(),
        CompressionSpec::default(),
    )
    .unwrap();

    let ctx = Arc::new(server::CoreContext::build(config).unwrap());
    let result = call(
        &ctx,
        "get_context",
        json!({"query": "how does login work", "min_score": 1.0}),
    )
    .await;
    assert_eq!(result["_meta"]["abstained"], true);
}

#[tokio::test]
async fn unicode_queries_are_handled() {
    let (_guard, ctx) = ctx_with(|_| {});
    let result = call(
        &ctx,
        "get_context",
        json!({"query": "¿cómo funciona la autenticación? 日本語 🌍"}),
    )
    .await;
    assert!(result["_meta"].get("error").is_none());
}

#[tokio::test]
async fn bom_prefixed_frame_is_accepted_end_to_end() {
    let (_guard, ctx) = ctx_with(|_| {});
    let frame = format!(
        "\u{feff}{}",
        json!({
            "jsonrpc": "2.0",
            "id": 11,
            "method": "tools/call",
            "params": {"name": "index_status", "arguments": {}},
        })
    );
    let response = server::protocol::handle_line(&ctx, &frame).await.unwrap();
    let value: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["id"], 11);
    assert!(value["result"]["_meta"]["version"].is_string());
}

#[tokio::test]
async fn failed_tool_calls_leave_no_session_state_behind() {
    let (_guard, ctx) = ctx_with(|_| {});
    // A failing retrieval against a missing session must not create it.
    call(&ctx, "get_context", json!({"query": "q", "session_id": "ghost"})).await;
    let listed = call(&ctx, "list_sessions", json!({})).await;
    assert_eq!(listed["_meta"]["session_count"], 0);
}

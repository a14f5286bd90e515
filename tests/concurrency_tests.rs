//! Concurrency: independent sessions mutate in parallel, read-mostly state
//! swaps under live readers, and the dispatcher serves interleaved calls.

use std::sync::Arc;

use anchora::EngineConfig;
use serde_json::json;
use session::{SessionDefaults, SessionManager, SessionStore, TurnMetadata};

#[test]
fn parallel_sessions_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("sessions")).unwrap();
    let manager = Arc::new(SessionManager::new(store, SessionDefaults::default()));

    for i in 0..4 {
        manager
            .create(&format!("s{i}"), Default::default(), None)
            .unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..4 {
        let manager = manager.clone();
        handles.push(std::thread::spawn(move || {
            let id = format!("s{i}");
            for turn in 0..25 {
                manager
                    .add_turn(&id, &format!("q{turn}"), "r", TurnMetadata::default())
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..4 {
        let id = format!("s{i}");
        let meta = manager.store().load_metadata(&id).unwrap().unwrap();
        assert_eq!(meta.turn_count, 25);
        assert_eq!(manager.store().load(&id).unwrap().len(), 25);
    }
}

#[test]
fn concurrent_appends_to_one_session_serialise() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("sessions")).unwrap();
    let manager = Arc::new(SessionManager::new(store, SessionDefaults::default()));
    manager.create("shared", Default::default(), None).unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = manager.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..10 {
                manager
                    .add_turn("shared", "q", "r", TurnMetadata::default())
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let turns = manager.store().load("shared").unwrap();
    assert_eq!(turns.len(), 40);
    // Turn ids are unique and the log is parseable end to end.
    let mut ids: Vec<u64> = turns.iter().map(|t| t.turn_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_tool_calls_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.embedding.dimension = 32;
    config.embedding.model = "hash-sin-32".to_string();
    let ctx = Arc::new(server::CoreContext::build(config).unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            server::protocol::handle_request(
                &ctx,
                json!({
                    "jsonrpc": "2.0",
                    "id": i,
                    "method": "tools/call",
                    "params": {"name": "get_context", "arguments": {"query": format!("query {i}")}},
                }),
            )
            .await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["_meta"]["abstained"], true);
    }

    let status = server::protocol::handle_request(
        &ctx,
        json!({"jsonrpc": "2.0", "id": 99, "method": "tools/call",
               "params": {"name": "index_status", "arguments": {}}}),
    )
    .await;
    assert_eq!(status["result"]["_meta"]["queries"], 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn entity_index_swap_under_live_readers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.embedding.dimension = 32;
    config.embedding.model = "hash-sin-32".to_string();
    let ctx = Arc::new(server::CoreContext::build(config).unwrap());

    let source_dir = dir.path().join("src");
    std::fs::create_dir_all(&source_dir).unwrap();
    std::fs::write(
        source_dir.join("auth.py"),
        "def login(user):\n    pass\n\ndef logout(user):\n    pass\n",
    )
    .unwrap();

    let mut handles = Vec::new();
    // Readers search while a writer reindexes.
    for i in 0..8 {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            server::protocol::handle_request(
                &ctx,
                json!({
                    "jsonrpc": "2.0",
                    "id": i,
                    "method": "tools/call",
                    "params": {"name": "search_entity", "arguments": {"name": "login"}},
                }),
            )
            .await
        }));
    }
    {
        let ctx = ctx.clone();
        let directory = source_dir.display().to_string();
        handles.push(tokio::spawn(async move {
            server::protocol::handle_request(
                &ctx,
                json!({
                    "jsonrpc": "2.0",
                    "id": 100,
                    "method": "tools/call",
                    "params": {"name": "index_code", "arguments": {"directory": directory}},
                }),
            )
            .await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        // Every call completes with a well-formed envelope, error or not.
        assert!(response["result"].get("content").is_some());
    }

    // After the rebuild, the new revision is visible.
    let result = server::protocol::handle_request(
        &ctx,
        json!({
            "jsonrpc": "2.0",
            "id": 101,
            "method": "tools/call",
            "params": {"name": "search_entity", "arguments": {"name": "login"}},
        }),
    )
    .await;
    assert_eq!(result["result"]["_meta"]["results_count"], 1);
}

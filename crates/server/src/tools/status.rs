//! `index_status`: one page of operational truth about the engine.

use serde_json::{json, Value};

use crate::error::{ToolResponse, ToolResult};
use crate::state::CoreContext;

pub fn index_status(ctx: &CoreContext, _args: &Value) -> ToolResult {
    let recent = ctx.stats.recent(10);
    let avg_response_time_ms = if recent.is_empty() {
        0.0
    } else {
        recent.iter().map(|e| e.elapsed_ms).sum::<f64>() / recent.len() as f64
    };
    let abstention_rate = if recent.is_empty() {
        0.0
    } else {
        recent.iter().filter(|e| e.abstained).count() as f64 / recent.len() as f64
    };

    let snapshot = ctx
        .snapshot
        .as_ref()
        .map(|m| {
            let head: String = m.snapshot_hash.chars().take(16).collect();
            format!("{head}...")
        })
        .unwrap_or_else(|| "N/A".to_string());

    let session_count = ctx.sessions.list().map(|s| s.len()).unwrap_or(0);
    let queries = ctx
        .stats
        .query_count
        .load(std::sync::atomic::Ordering::Relaxed);
    let uptime_minutes = (ctx.stats.uptime_minutes() * 10.0).round() / 10.0;
    let stats = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "snapshot": snapshot,
        "total_chunks": ctx.chunks.len(),
        "vectors": ctx.engine.num_vectors(),
        "model": ctx.engine.model_id(),
        "queries": queries,
        "sessions": session_count,
        "uptime_minutes": uptime_minutes,
        "avg_response_time_ms": (avg_response_time_ms * 100.0).round() / 100.0,
        "abstention_rate": (abstention_rate * 1000.0).round() / 10.0,
        "recent_queries": recent.len(),
        "truth_facts": ctx.world().len(),
        "entities_indexed": ctx.entity_index().records().len(),
    });

    let text = format!(
        "anchora - Index Status\n\n\
         Version: {}\n\
         Snapshot: {snapshot}\n\
         Chunks: {}\n\
         Vectors: {}\n\
         Model: {}\n\
         Queries: {queries}\n\
         Sessions: {session_count}\n\
         Uptime: {uptime_minutes} minutes\n\
         Avg Response Time: {:.2}ms\n\
         Abstention Rate: {:.1}%\n\
         Recent Queries: {}\n",
        env!("CARGO_PKG_VERSION"),
        ctx.chunks.len(),
        ctx.engine.num_vectors(),
        ctx.engine.model_id(),
        avg_response_time_ms,
        abstention_rate * 100.0,
        recent.len(),
    );

    Ok(ToolResponse::new(text, stats))
}

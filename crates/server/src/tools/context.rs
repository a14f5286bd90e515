//! `get_context`: the main retrieval pipeline.
//!
//! With a session attached the pipeline is: load history → trim it to the
//! token budget → resolve references against history/tracker/index → search
//! with multi-vector retrieval → calibrate per-chunk confidence → filter on
//! `min_score` → format, trim the outgoing text, append the turn, and update
//! the tracker. Without a session the resolution and memory steps drop out.

use std::time::Instant;

use budget::{Section, TokenBudget};
use serde_json::{json, Value};
use session::{TurnMetadata, TurnRecord};

use crate::error::{ToolError, ToolResponse, ToolResult};
use crate::state::{CoreContext, QueryLogEntry};
use crate::tools::{optional_f32, optional_str, optional_usize, required_str};

/// Fixed abstention text; callers match on `_meta.abstained`, humans read
/// this.
pub const ABSTAIN_TEXT: &str = "No sufficient information found in memory for this query.";

pub fn get_context(ctx: &CoreContext, args: &Value) -> ToolResult {
    let query = required_str(args, "query")?;
    let top_k = optional_usize(args, "top_k").unwrap_or(ctx.config.retrieval.top_k);
    let min_score = optional_f32(args, "min_score").unwrap_or(ctx.config.retrieval.min_score);
    let session_id = optional_str(args, "session_id");

    metrics::counter!("anchora_queries_total").increment(1);
    match session_id {
        Some(session_id) => with_session(ctx, query, top_k, min_score, session_id),
        None => direct(ctx, query, top_k, min_score, None),
    }
}

fn with_session(
    ctx: &CoreContext,
    query: &str,
    top_k: usize,
    min_score: f32,
    session_id: &str,
) -> ToolResult {
    let entry = ctx.sessions.load(session_id).map_err(ToolError::from)?;

    // History for resolution, trimmed to the token budget.
    let (history, next_turn_id) = {
        let memory = entry.lock().unwrap_or_else(|e| e.into_inner());
        (
            memory.recent(ctx.config.session.history_turns),
            memory.next_turn_id(),
        )
    };
    let optimized = optimize_history(&ctx.budget, &history);

    let index = ctx.entity_index();
    let index_ref = if ctx.config.indexing.enabled && !index.is_empty() {
        Some(index.as_ref())
    } else {
        None
    };
    let (expanded_query, resolved) =
        ctx.resolver
            .resolve(query, &optimized, ctx.tracker.as_ref(), index_ref);

    let mut response = direct(ctx, &expanded_query, top_k, min_score, Some(session_id))?;

    // Trim the outgoing text to the budget.
    let available = ctx.budget.available();
    if TokenBudget::estimate(&response.text) > available {
        response.text = TokenBudget::truncate(&response.text, available);
    }

    // Track entities mentioned by this turn, then persist the turn itself.
    let entities = match (&ctx.tracker, index_ref) {
        (Some(tracker), Some(index)) => {
            tracker.record_turn(index, session_id, next_turn_id, query, &response.text)
        }
        _ => Vec::new(),
    };
    let turn = ctx
        .sessions
        .add_turn(
            session_id,
            query,
            &response.text,
            TurnMetadata {
                entities: entities.clone(),
                files: Vec::new(),
            },
        )
        .map_err(ToolError::from)?;

    if let Some(meta) = response.meta.as_object_mut() {
        meta.insert("session_id".to_string(), json!(session_id));
        meta.insert("turn_id".to_string(), json!(turn.turn_id));
        meta.insert("original_query".to_string(), json!(query));
        meta.insert("expanded_query".to_string(), json!(expanded_query));
        meta.insert("resolved_references".to_string(), json!(resolved));
        meta.insert("entities_mentioned".to_string(), json!(entities));
        meta.insert(
            "token_budget".to_string(),
            json!({
                "max_tokens": ctx.budget.max_tokens,
                "reserved_tokens": ctx.budget.reserved_tokens,
                "available": ctx.budget.available(),
                "history_turns_used": optimized.len(),
            }),
        );
    }
    Ok(response)
}

fn direct(
    ctx: &CoreContext,
    query: &str,
    top_k: usize,
    min_score: f32,
    session_id: Option<&str>,
) -> ToolResult {
    let started = Instant::now();
    let query_no = ctx.bump_queries();
    tracing::info!(query_no, query = %truncate_for_log(query), "retrieval query");

    let (hits, expanded_queries) = if ctx.config.retrieval.max_expansions > 1 {
        ctx.engine
            .search_with_mvr(query, top_k)
            .map_err(|e| ToolError::internal(e.to_string()))?
    } else {
        let q = ctx.engine.embed_query(query);
        let hits = ctx
            .engine
            .search(&q, top_k)
            .map_err(|e| ToolError::internal(e.to_string()))?;
        (hits, vec![query.to_string()])
    };

    let mut results = Vec::new();
    let mut calibration_entries = Vec::new();
    for hit in &hits {
        if hit.score < min_score {
            continue;
        }
        let Some(chunk) = ctx.chunk(hit.chunk_id) else {
            continue;
        };
        let calibrated = ctx.calibrator.calibrate(hit.score);
        calibration_entries.push(json!({
            "chunk_id": chunk.chunk_id,
            "raw_score": calibrated.raw_score,
            "calibrated_score": calibrated.calibrated_score,
            "confidence_level": calibrated.confidence_level,
            "uncertainty": calibrated.uncertainty,
        }));
        results.push((chunk, hit.score));
    }

    let abstained = results.is_empty();
    let text = if abstained {
        ABSTAIN_TEXT.to_string()
    } else {
        format_results(query, &results)
    };

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    ctx.stats.record(QueryLogEntry {
        timestamp: chrono::Utc::now(),
        query: query.to_string(),
        results_count: results.len(),
        abstained,
        elapsed_ms,
        top_score: results.first().map(|(_, s)| *s).unwrap_or(0.0),
        session_id: session_id.map(str::to_string),
    });

    let provenance: Vec<Value> = results
        .iter()
        .map(|(chunk, score)| {
            json!({
                "chunk_id": chunk.chunk_id,
                "file": chunk.file_path,
                "lines": chunk.line_range(),
                "score": (score * 1000.0).round() / 1000.0,
            })
        })
        .collect();

    Ok(ToolResponse::new(
        text,
        json!({
            "query": query,
            "results_count": results.len(),
            "abstained": abstained,
            "time_ms": (elapsed_ms * 100.0).round() / 100.0,
            "provenance": provenance,
            "expanded_queries": expanded_queries,
            "confidence_calibration": {
                "enabled": ctx.config.calibration.enabled,
                "entries": calibration_entries,
            },
        }),
    ))
}

/// Convert history turns into budget sections (recent turns weigh more) and
/// admit as many as fit.
fn optimize_history(token_budget: &TokenBudget, history: &[TurnRecord]) -> Vec<TurnRecord> {
    if history.is_empty() {
        return Vec::new();
    }
    let last = history.len() - 1;
    let sections: Vec<Section> = history
        .iter()
        .enumerate()
        .map(|(i, turn)| Section {
            id: format!("turn_{}", turn.turn_id),
            content: format!("Q: {}\nA: {}", turn.query, turn.response),
            relevance: 1.0 - (last - i) as f32 * 0.1,
            last_updated: Some(turn.timestamp.to_rfc3339()),
            access_count: 1,
        })
        .collect();

    let admitted = token_budget.allocate(&sections);
    let mut optimized: Vec<TurnRecord> = history
        .iter()
        .filter(|turn| admitted.iter().any(|s| s.id == format!("turn_{}", turn.turn_id)))
        .cloned()
        .collect();
    // Content may have been truncated; mirror it back onto the response.
    for turn in &mut optimized {
        if let Some(section) = admitted.iter().find(|s| s.id == format!("turn_{}", turn.turn_id)) {
            if let Some((_, answer)) = section.content.split_once("\nA: ") {
                if answer != turn.response {
                    turn.response = answer.to_string();
                }
            }
        }
    }
    tracing::debug!(
        before = history.len(),
        after = optimized.len(),
        "history trimmed to token budget"
    );
    optimized
}

fn format_results(query: &str, results: &[(&store::ChunkRecord, f32)]) -> String {
    let mut out = format!("Context for: {query}\n\n");
    for (i, (chunk, score)) in results.iter().enumerate() {
        let preview: String = chunk.text().chars().take(200).collect();
        out.push_str(&format!(
            "{}. {} (lines {}, score: {score:.3})\n{preview}...\n\n",
            i + 1,
            chunk.file_path,
            chunk.line_range(),
        ));
    }
    out
}

fn truncate_for_log(query: &str) -> String {
    query.chars().take(100).collect()
}

//! World-model and knowledge-package tools.

use std::sync::atomic::Ordering;

use ground::WorldModel;
use serde_json::{json, Value};

use crate::error::{ToolError, ToolResponse, ToolResult};
use crate::state::CoreContext;
use crate::tools::{optional_usize, required_str};

/// `audit_jepa`: score a proposal against the world model. The report
/// travels in `_meta` verbatim.
pub fn audit_jepa(ctx: &CoreContext, args: &Value) -> ToolResult {
    let query = required_str(args, "query")?;
    let proposal = required_str(args, "proposal")?;

    let world = ctx.world();
    let report = ctx.auditor.audit(&world, query, proposal);
    let message = report.message.clone();
    let meta = serde_json::to_value(&report)
        .map_err(|e| ToolError::internal(format!("audit serialisation: {e}")))?;
    Ok(ToolResponse::new(message, meta))
}

/// `ground_project_context`: evidence block for a query.
pub fn ground_project_context(ctx: &CoreContext, args: &Value) -> ToolResult {
    let query = required_str(args, "query")?;
    let world = ctx.world();
    let evidence = ctx
        .grounding
        .evidence(&world, query, ctx.config.grounding.top_k);
    let has_evidence = evidence != ground::NO_EVIDENCE_TEXT;
    Ok(ToolResponse::new(
        evidence,
        json!({"query": query, "evidence_found": has_evidence, "corpus_facts": world.len()}),
    ))
}

/// `sync_world_model`: rescan the truth corpus and swap the model.
pub fn sync_world_model(ctx: &CoreContext, _args: &Value) -> ToolResult {
    ctx.world_rebuild_cancel.store(false, Ordering::Relaxed);
    let rebuilt = WorldModel::build(
        ctx.config.project_context_dir(),
        &ctx.embedder,
        &ctx.world_rebuild_cancel,
    )?;
    let facts = rebuilt.len();
    ctx.swap_world(rebuilt);
    Ok(ToolResponse::new(
        format!("World model synchronized: {facts} facts indexed."),
        json!({"facts": facts}),
    ))
}

pub fn get_relevant_skills(ctx: &CoreContext, args: &Value) -> ToolResult {
    let query = required_str(args, "query")?;
    let top_k = optional_usize(args, "top_k").unwrap_or(3);
    ctx.skills.relevant(query, top_k)
}

pub fn create_skill(ctx: &CoreContext, args: &Value) -> ToolResult {
    let skill_id = required_str(args, "skill_id")?;
    let content = required_str(args, "content")?;
    ctx.skills.create(skill_id, content)
}

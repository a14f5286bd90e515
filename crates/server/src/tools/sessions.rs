//! Session lifecycle tools.

use std::str::FromStr;

use serde_json::{json, Value};
use session::{MemoryPolicy, SessionKind};

use crate::error::{ToolError, ToolResponse, ToolResult};
use crate::state::CoreContext;
use crate::tools::{optional_str, required_str};

pub fn create_session(ctx: &CoreContext, args: &Value) -> ToolResult {
    let session_id = required_str(args, "session_id")?;
    let kind = match optional_str(args, "session_type") {
        Some(raw) => SessionKind::from_str(raw).map_err(ToolError::invalid)?,
        None => SessionKind::General,
    };
    let policy = match optional_str(args, "strategy") {
        Some(raw) => Some(MemoryPolicy::from_str(raw).map_err(ToolError::invalid)?),
        None => None,
    };

    let metadata = ctx.sessions.create(session_id, kind, policy)?;

    Ok(ToolResponse::new(
        format!(
            "Session created: {session_id}\n\nType: {}\nStrategy: {}\n\nThe session is now active and ready to track context.",
            metadata.session_type.as_str(),
            metadata.policy.as_str(),
        ),
        json!({
            "session_id": metadata.session_id,
            "session_type": metadata.session_type,
            "strategy": metadata.policy,
        }),
    ))
}

pub fn list_sessions(ctx: &CoreContext, _args: &Value) -> ToolResult {
    let sessions = ctx.sessions.list()?;
    let text = if sessions.is_empty() {
        "No active sessions found.\n\nCreate a session using the 'create_session' tool.".to_string()
    } else {
        let mut text = format!("Active Sessions ({}):\n\n", sessions.len());
        for meta in &sessions {
            text.push_str(&format!(
                "- {}: {} turns ({})\n",
                meta.session_id,
                meta.turn_count,
                meta.session_type.as_str(),
            ));
        }
        text
    };
    Ok(ToolResponse::new(
        text,
        json!({"session_count": sessions.len(), "sessions": sessions}),
    ))
}

pub fn get_session_summary(ctx: &CoreContext, args: &Value) -> ToolResult {
    let session_id = required_str(args, "session_id")?;
    let summary = ctx.sessions.summary(session_id)?;

    let mut text = format!("Session Summary: {session_id}\n\n");
    text.push_str(&format!("Type: {}\n", summary.session_type.as_str()));
    text.push_str(&format!("Strategy: {}\n", summary.policy.as_str()));
    text.push_str(&format!("Created: {}\n", summary.created_at.to_rfc3339()));
    text.push_str(&format!("Turns: {}\n", summary.turn_count));
    if summary.summarised_turns > 0 {
        text.push_str(&format!("Summarised Turns: {}\n", summary.summarised_turns));
    }
    if !summary.entities.is_empty() {
        let shown: Vec<&str> = summary.entities.iter().take(10).map(String::as_str).collect();
        text.push_str(&format!("Entities Mentioned: {}\n", shown.join(", ")));
    }

    let meta = serde_json::to_value(&summary)
        .map_err(|e| ToolError::internal(format!("summary serialisation: {e}")))?;
    Ok(ToolResponse::new(text, meta))
}

pub fn delete_session(ctx: &CoreContext, args: &Value) -> ToolResult {
    let session_id = required_str(args, "session_id")?;
    if ctx.sessions.delete(session_id)? {
        Ok(ToolResponse::new(
            format!("Session {session_id} deleted successfully."),
            json!({"session_id": session_id, "deleted": true}),
        ))
    } else {
        Err(ToolError::session_not_found(session_id))
    }
}

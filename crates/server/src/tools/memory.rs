//! `memory_tool`: CRUD over the scratch memory store.

use serde_json::Value;

use crate::error::{ToolError, ToolResult};
use crate::state::CoreContext;
use crate::tools::{optional_str, required_str};

pub fn memory_tool(ctx: &CoreContext, args: &Value) -> ToolResult {
    let command = required_str(args, "command")?;
    let session_id = optional_str(args, "session_id");

    match command {
        "create" => {
            let file_path = required_str(args, "file_path")?;
            let content = required_str(args, "content")?;
            ctx.memories.create(file_path, content, session_id)
        }
        "read" => {
            let file_path = required_str(args, "file_path")?;
            ctx.memories.read(file_path, session_id)
        }
        "update" => {
            let file_path = required_str(args, "file_path")?;
            let content = required_str(args, "content")?;
            ctx.memories.update(file_path, content, session_id)
        }
        "delete" => {
            let file_path = required_str(args, "file_path")?;
            ctx.memories.delete(file_path, session_id)
        }
        "list" => ctx.memories.list(session_id),
        other => Err(ToolError::invalid(format!(
            "Unknown memory command '{other}'"
        ))),
    }
}

//! The tool surface: a closed name set dispatched to handlers.
//!
//! Dynamic name-to-handler lookup is deliberately absent — the tool set is a
//! closed enum, `tools/list` is generated from the same table, and an
//! unknown name is an `invalid_request`, not a reflection miss.

mod context;
mod entities;
mod grounding;
mod memory;
mod sessions;
mod status;
mod validate;

use serde_json::{json, Value};

use crate::error::{ToolError, ToolResult};
use crate::state::CoreContext;

/// Every tool the dispatcher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    GetContext,
    ValidateResponse,
    IndexStatus,
    MemoryTool,
    CreateSession,
    ListSessions,
    GetSessionSummary,
    DeleteSession,
    IndexCode,
    SearchEntity,
    AuditJepa,
    GroundProjectContext,
    SyncWorldModel,
    ListSkills,
    GetRelevantSkills,
    CreateSkill,
}

impl ToolName {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "get_context" => ToolName::GetContext,
            "validate_response" => ToolName::ValidateResponse,
            "index_status" => ToolName::IndexStatus,
            "memory_tool" => ToolName::MemoryTool,
            "create_session" => ToolName::CreateSession,
            "list_sessions" => ToolName::ListSessions,
            "get_session_summary" => ToolName::GetSessionSummary,
            "delete_session" => ToolName::DeleteSession,
            "index_code" => ToolName::IndexCode,
            "search_entity" => ToolName::SearchEntity,
            "audit_jepa" => ToolName::AuditJepa,
            "ground_project_context" => ToolName::GroundProjectContext,
            "sync_world_model" => ToolName::SyncWorldModel,
            "list_skills" => ToolName::ListSkills,
            "get_relevant_skills" => ToolName::GetRelevantSkills,
            "create_skill" => ToolName::CreateSkill,
            _ => return None,
        })
    }
}

/// Route one tool call. All handler failures come back as `Err(ToolError)`;
/// nothing panics across this boundary.
pub fn dispatch(ctx: &CoreContext, name: &str, args: &Value) -> ToolResult {
    let Some(tool) = ToolName::parse(name) else {
        return Err(ToolError::invalid(format!("Unknown tool: {name}")));
    };
    match tool {
        ToolName::GetContext => context::get_context(ctx, args),
        ToolName::ValidateResponse => validate::validate_response(ctx, args),
        ToolName::IndexStatus => status::index_status(ctx, args),
        ToolName::MemoryTool => memory::memory_tool(ctx, args),
        ToolName::CreateSession => sessions::create_session(ctx, args),
        ToolName::ListSessions => sessions::list_sessions(ctx, args),
        ToolName::GetSessionSummary => sessions::get_session_summary(ctx, args),
        ToolName::DeleteSession => sessions::delete_session(ctx, args),
        ToolName::IndexCode => entities::index_code(ctx, args),
        ToolName::SearchEntity => entities::search_entity(ctx, args),
        ToolName::AuditJepa => grounding::audit_jepa(ctx, args),
        ToolName::GroundProjectContext => grounding::ground_project_context(ctx, args),
        ToolName::SyncWorldModel => grounding::sync_world_model(ctx, args),
        ToolName::ListSkills => ctx.skills.list(),
        ToolName::GetRelevantSkills => grounding::get_relevant_skills(ctx, args),
        ToolName::CreateSkill => grounding::create_skill(ctx, args),
    }
}

/// The `tools/list` catalogue with JSON-Schema input descriptors.
pub fn catalogue() -> Value {
    json!([
        {
            "name": "get_context",
            "description": "Retrieve context chunks from memory with provenance and calibrated confidence",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "top_k": {"type": "integer", "default": 5},
                    "min_score": {"type": "number", "default": 0.5},
                    "session_id": {"type": "string"}
                },
                "required": ["query"]
            }
        },
        {
            "name": "validate_response",
            "description": "Validate a candidate answer against evidence chunks",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "candidate_text": {"type": "string"},
                    "evidence_ids": {"type": "array", "items": {"type": "integer"}}
                },
                "required": ["candidate_text", "evidence_ids"]
            }
        },
        {
            "name": "index_status",
            "description": "Snapshot, query, and session statistics",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "memory_tool",
            "description": "CRUD over persistent scratch memories",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "command": {"type": "string", "enum": ["create", "read", "update", "delete", "list"]},
                    "file_path": {"type": "string"},
                    "content": {"type": "string"},
                    "session_id": {"type": "string"}
                },
                "required": ["command"]
            }
        },
        {
            "name": "create_session",
            "description": "Create a development session with contextual memory",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "session_id": {"type": "string"},
                    "session_type": {"type": "string", "enum": ["feature", "bugfix", "review", "refactor", "general"]},
                    "strategy": {"type": "string", "enum": ["sliding", "summarising"]}
                },
                "required": ["session_id"]
            }
        },
        {
            "name": "list_sessions",
            "description": "List known sessions",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "get_session_summary",
            "description": "Summary of one session: turns, entities, policy state",
            "inputSchema": {
                "type": "object",
                "properties": {"session_id": {"type": "string"}},
                "required": ["session_id"]
            }
        },
        {
            "name": "delete_session",
            "description": "Delete a session and its history",
            "inputSchema": {
                "type": "object",
                "properties": {"session_id": {"type": "string"}},
                "required": ["session_id"]
            }
        },
        {
            "name": "index_code",
            "description": "Index code entities from a source directory",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "directory": {"type": "string"},
                    "recursive": {"type": "boolean", "default": true}
                },
                "required": ["directory"]
            }
        },
        {
            "name": "search_entity",
            "description": "Search indexed functions and classes by name",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "entity_type": {"type": "string", "enum": ["function", "class", "any"], "default": "any"}
                },
                "required": ["name"]
            }
        },
        {
            "name": "audit_jepa",
            "description": "Audit a proposal against the project world model",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "proposal": {"type": "string"}
                },
                "required": ["query", "proposal"]
            }
        },
        {
            "name": "ground_project_context",
            "description": "Retrieve factual evidence from the project truth documents",
            "inputSchema": {
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }
        },
        {
            "name": "sync_world_model",
            "description": "Rescan the truth corpus and rebuild the world model",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "list_skills",
            "description": "List installed knowledge packages",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "get_relevant_skills",
            "description": "Rank knowledge packages by relevance to a query",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "top_k": {"type": "integer", "default": 3}
                },
                "required": ["query"]
            }
        },
        {
            "name": "create_skill",
            "description": "Install a knowledge package",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "skill_id": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["skill_id", "content"]
            }
        }
    ])
}

// ── Argument helpers shared by the handlers ─────────────────────────────

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::invalid(format!("Missing required argument '{key}'")))
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn optional_usize(args: &Value, key: &str) -> Option<usize> {
    args.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

pub(crate) fn optional_f32(args: &Value, key: &str) -> Option<f32> {
    args.get(key).and_then(Value::as_f64).map(|v| v as f32)
}

pub(crate) fn optional_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(Value::as_bool)
}

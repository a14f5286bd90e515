//! The tool-response envelope and the error kinds that cross the dispatch
//! boundary.
//!
//! Handlers return [`ToolResult`]; the dispatcher serialises either arm to
//! the same wire shape: a `content` array of text parts plus a `_meta`
//! object. Errors carry one of a closed set of reasons — callers branch on
//! the reason, humans read the message.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

pub type ToolResult = Result<ToolResponse, ToolError>;

/// The closed set of failure reasons visible on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// Malformed arguments, unknown tool, schema violations.
    InvalidRequest,
    NotFound,
    SessionNotFound,
    /// A feature switched off in configuration was invoked.
    Disabled,
    IndexingDisabled,
    /// Snapshot embedding model disagrees with the engine's.
    IncompatibleIndex,
    Timeout,
    /// Anything else; the concrete cause is logged, not leaked.
    Internal,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::InvalidRequest => "invalid_request",
            ErrorReason::NotFound => "not_found",
            ErrorReason::SessionNotFound => "session_not_found",
            ErrorReason::Disabled => "disabled",
            ErrorReason::IndexingDisabled => "indexing_disabled",
            ErrorReason::IncompatibleIndex => "incompatible_index",
            ErrorReason::Timeout => "timeout",
            ErrorReason::Internal => "internal",
        }
    }
}

/// A handler failure, serialised as `{_meta: {error: true, reason}, content}`.
#[derive(Debug, Clone, Error)]
#[error("{reason:?}: {message}")]
pub struct ToolError {
    pub reason: ErrorReason,
    pub message: String,
}

impl ToolError {
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::NotFound, message)
    }

    pub fn session_not_found(session_id: &str) -> Self {
        Self::new(
            ErrorReason::SessionNotFound,
            format!("Session {session_id} not found"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::Internal, message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorReason::Timeout, "request deadline exceeded")
    }

    /// Wire shape of the failure.
    pub fn to_value(&self) -> Value {
        json!({
            "content": [{"type": "text", "text": self.message}],
            "_meta": {"error": true, "reason": self.reason.as_str()},
        })
    }
}

impl From<session::SessionError> for ToolError {
    fn from(err: session::SessionError) -> Self {
        match err {
            session::SessionError::NotFound(id) => ToolError::session_not_found(&id),
            session::SessionError::AlreadyExists(id) => {
                ToolError::invalid(format!("Session {id} already exists"))
            }
            session::SessionError::InvalidId(id) => {
                ToolError::invalid(format!("Invalid session id '{id}'"))
            }
            other => {
                tracing::error!(%other, "session layer failure");
                ToolError::internal("session storage failure")
            }
        }
    }
}

impl From<entity::EntityError> for ToolError {
    fn from(err: entity::EntityError) -> Self {
        match err {
            entity::EntityError::MissingDirectory(dir) => {
                ToolError::not_found(format!("Directory not found: {dir}"))
            }
            other => {
                tracing::error!(%other, "entity layer failure");
                ToolError::internal("entity index failure")
            }
        }
    }
}

impl From<ground::GroundError> for ToolError {
    fn from(err: ground::GroundError) -> Self {
        tracing::error!(%err, "grounding layer failure");
        ToolError::internal("world model failure")
    }
}

/// A successful tool response: text parts plus structured `_meta`.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub text: String,
    pub meta: Value,
}

impl ToolResponse {
    pub fn new(text: impl Into<String>, meta: Value) -> Self {
        Self {
            text: text.into(),
            meta,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "content": [{"type": "text", "text": self.text}],
            "_meta": self.meta,
        })
    }
}

/// Collapse either arm to the wire shape. Handler failures are structured
/// results, not protocol errors.
pub fn envelope(result: ToolResult) -> Value {
    match result {
        Ok(response) => response.to_value(),
        Err(err) => {
            tracing::warn!(reason = err.reason.as_str(), message = %err.message, "tool error");
            err.to_value()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_shape() {
        let value = ToolError::session_not_found("s9").to_value();
        assert_eq!(value["_meta"]["error"], true);
        assert_eq!(value["_meta"]["reason"], "session_not_found");
        assert!(value["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("s9"));
    }

    #[test]
    fn success_envelope_shape() {
        let value = ToolResponse::new("hello", json!({"x": 1})).to_value();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "hello");
        assert_eq!(value["_meta"]["x"], 1);
    }

    #[test]
    fn reasons_serialise_snake_case() {
        assert_eq!(ErrorReason::IndexingDisabled.as_str(), "indexing_disabled");
        assert_eq!(ErrorReason::IncompatibleIndex.as_str(), "incompatible_index");
    }

    #[test]
    fn session_errors_map_to_reasons() {
        let err: ToolError = session::SessionError::NotFound("a".into()).into();
        assert_eq!(err.reason, ErrorReason::SessionNotFound);
        let err: ToolError = session::SessionError::InvalidId("..".into()).into();
        assert_eq!(err.reason, ErrorReason::InvalidRequest);
    }
}

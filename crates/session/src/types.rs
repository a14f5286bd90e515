use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive session category; carried for operators, never branched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Feature,
    Bugfix,
    Review,
    Refactor,
    #[default]
    General,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Feature => "feature",
            SessionKind::Bugfix => "bugfix",
            SessionKind::Review => "review",
            SessionKind::Refactor => "refactor",
            SessionKind::General => "general",
        }
    }
}

impl std::str::FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(SessionKind::Feature),
            "bugfix" => Ok(SessionKind::Bugfix),
            "review" => Ok(SessionKind::Review),
            "refactor" => Ok(SessionKind::Refactor),
            "general" => Ok(SessionKind::General),
            other => Err(format!("unknown session type '{other}'")),
        }
    }
}

/// Which in-memory policy a session runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPolicy {
    #[default]
    Sliding,
    Summarising,
}

impl MemoryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryPolicy::Sliding => "sliding",
            MemoryPolicy::Summarising => "summarising",
        }
    }
}

impl std::str::FromStr for MemoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sliding" | "trimming" => Ok(MemoryPolicy::Sliding),
            "summarising" | "summarizing" => Ok(MemoryPolicy::Summarising),
            other => Err(format!("unknown session policy '{other}'")),
        }
    }
}

/// Structured facts attached to a turn by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TurnMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// One interaction: a query, the engine's response, and detected entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Monotonically increasing, 1-based within a session.
    pub turn_id: u64,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub metadata: TurnMetadata,
}

impl TurnRecord {
    pub fn new(turn_id: u64, query: impl Into<String>, response: impl Into<String>, metadata: TurnMetadata) -> Self {
        Self {
            turn_id,
            timestamp: Utc::now(),
            query: query.into(),
            response: response.into(),
            metadata,
        }
    }
}

/// Sidecar record kept next to the turn log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    #[serde(default)]
    pub session_type: SessionKind,
    #[serde(default)]
    pub policy: MemoryPolicy,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Total turns ever appended; never decreases, even when a sliding
    /// policy drops turns from memory.
    pub turn_count: u64,
}

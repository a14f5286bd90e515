use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of thing an indexed entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    Class,
    Constant,
    Endpoint,
    Model,
    Pattern,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Class => "class",
            EntityKind::Constant => "constant",
            EntityKind::Endpoint => "endpoint",
            EntityKind::Model => "model",
            EntityKind::Pattern => "pattern",
        }
    }
}

/// One indexed code entity. `(kind, module, name)` is unique within an
/// index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub kind: EntityKind,
    pub module: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<String>,
}

impl EntityRecord {
    /// The uniqueness key within an index.
    pub fn key(&self) -> (EntityKind, &str, &str) {
        (self.kind, self.module.as_str(), self.name.as_str())
    }
}

/// A single conversational mention of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub entity_name: String,
    pub session_id: String,
    pub turn_id: u64,
    /// Text surrounding the mention (roughly ±50 characters).
    pub snippet: String,
    pub timestamp: DateTime<Utc>,
}

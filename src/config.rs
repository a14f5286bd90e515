//! YAML bundle configuration for the whole engine.
//!
//! One document describes every layer: storage, embedding, retrieval,
//! sessions, entity indexing, token budget, audit, grounding, memories, and
//! the server surface. Every section has defaults, so an empty file is a
//! valid configuration.
//!
//! ## Example
//!
//! ```yaml
//! version: "1.0"
//! data_dir: data
//!
//! embedding:
//!   model: hash-sin-384
//!   dimension: 384
//!
//! retrieval:
//!   top_k: 5
//!   min_score: 0.5
//!   max_expansions: 3
//!
//! session:
//!   default_policy: sliding
//!   max_turns: 8
//!   retention_days: 30
//!
//! audit:
//!   anchor_threshold: 0.5
//!   contradiction_threshold: 0.4
//!   contradiction_penalty: 0.2
//!
//! server:
//!   bind_addr: 127.0.0.1
//!   port: 8900
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use session::{MemoryPolicy, SessionDefaults};
use vector::{AnnConfig, CalibrationConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML config: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Embedding model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier; must match the snapshot the engine loads.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            dimension: default_dimension(),
        }
    }
}

/// Retrieval behaviour for `get_context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Query variants used by multi-vector retrieval (1 disables expansion).
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
    #[serde(default)]
    pub ann: AnnConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            max_expansions: default_max_expansions(),
            ann: AnnConfig::default(),
        }
    }
}

/// Session policy defaults and retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub default_policy: MemoryPolicy,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_keep_last")]
    pub keep_last: usize,
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default = "default_cache_cap")]
    pub cache_cap: usize,
    /// Days before a session is swept; 0 keeps sessions forever.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Turns of history offered to reference resolution.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_policy: MemoryPolicy::default(),
            max_turns: default_max_turns(),
            keep_last: default_keep_last(),
            context_limit: default_context_limit(),
            cache_cap: default_cache_cap(),
            retention_days: default_retention_days(),
            history_turns: default_history_turns(),
        }
    }
}

impl SessionConfig {
    pub fn defaults(&self) -> SessionDefaults {
        SessionDefaults {
            policy: self.default_policy,
            max_turns: self.max_turns,
            keep_last: self.keep_last,
            context_limit: self.context_limit,
            cache_cap: self.cache_cap,
        }
    }
}

/// Feature switches for entity indexing and mention tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Token-budget limits; see the `budget` crate for allocation rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_reserved_tokens")]
    pub reserved_tokens: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            reserved_tokens: default_reserved_tokens(),
        }
    }
}

/// Grounding evidence retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundingConfig {
    #[serde(default = "default_min_score")]
    pub evidence_threshold: f32,
    #[serde(default = "default_evidence_top_k")]
    pub top_k: usize,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            evidence_threshold: default_min_score(),
            top_k: default_evidence_top_k(),
        }
    }
}

/// memory_tool scratch storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Scope memories under a per-session subdirectory.
    #[serde(default = "default_true")]
    pub per_session: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { per_session: true }
    }
}

/// Serving surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request deadline.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

/// The full engine configuration bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub indexing: FeatureConfig,
    #[serde(default)]
    pub tracking: FeatureConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub audit: ground::AuditConfig,
    #[serde(default)]
    pub grounding: GroundingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: None,
            data_dir: default_data_dir(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            calibration: CalibrationConfig::default(),
            session: SessionConfig::default(),
            indexing: FeatureConfig::default(),
            tracking: FeatureConfig::default(),
            budget: BudgetConfig::default(),
            audit: ground::AuditConfig::default(),
            grounding: GroundingConfig::default(),
            memory: MemoryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid("embedding.dimension must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(ConfigError::Invalid(
                "retrieval.min_score must be in [0, 1]".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be > 0".into()));
        }
        if self.budget.reserved_tokens > self.budget.max_tokens {
            return Err(ConfigError::Invalid(
                "budget.reserved_tokens exceeds budget.max_tokens".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.audit.anchor_threshold)
            || !(0.0..=1.0).contains(&self.audit.contradiction_threshold)
        {
            return Err(ConfigError::Invalid(
                "audit thresholds must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }

    // ── Derived data paths ──────────────────────────────────────────────

    pub fn container_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("context_vectors.{}", store::CONTAINER_EXTENSION))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    pub fn entities_path(&self) -> PathBuf {
        self.data_dir.join("code_index").join("entities.json")
    }

    pub fn tracking_path(&self) -> PathBuf {
        self.data_dir.join("code_index").join("entity_tracking.json")
    }

    pub fn memories_dir(&self) -> PathBuf {
        self.data_dir.join("memories")
    }

    pub fn project_context_dir(&self) -> PathBuf {
        self.data_dir.join("project_context")
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.data_dir.join("skills")
    }
}

fn default_model() -> String {
    "hash-sin-384".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_top_k() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.5
}

fn default_max_expansions() -> usize {
    3
}

fn default_max_turns() -> usize {
    8
}

fn default_keep_last() -> usize {
    3
}

fn default_context_limit() -> usize {
    10
}

fn default_cache_cap() -> usize {
    64
}

fn default_retention_days() -> u32 {
    30
}

fn default_history_turns() -> usize {
    5
}

fn default_max_tokens() -> usize {
    4000
}

fn default_reserved_tokens() -> usize {
    500
}

fn default_evidence_top_k() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8900
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

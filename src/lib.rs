//! Umbrella crate for the anchora contextual retrieval and grounding engine.
//!
//! anchora answers an agent's queries from a vector-indexed corpus and keeps
//! the answers honest: retrieval carries per-chunk provenance and calibrated
//! confidence, conversational queries are rewritten against session history
//! before they hit the index, and candidate answers can be audited against a
//! world model built from the project's own truth documents.
//!
//! The engine is layered into small crates, re-exported here so applications
//! can depend on a single crate:
//!
//! | layer | crate | responsibility |
//! |---|---|---|
//! | [`store`] | `anchora-store` | single-file snapshot container (chunks, vectors, ANN blob) |
//! | [`vector`] | `anchora-vector` | embedding, cosine ANN, multi-vector retrieval, calibration |
//! | [`session`] | `anchora-session` | turn logs, sliding/summarising memory, session manager |
//! | [`entity`] | `anchora-entity` | code entity index and mention tracking |
//! | [`resolve`] | `anchora-resolve` | reference detection and query rewriting |
//! | [`budget`] | `anchora-budget` | token-budget allocation and truncation |
//! | [`ground`] | `anchora-ground` | world-model audit and evidence grounding |
//!
//! The serving layer (`anchora-server`) composes these behind a line-framed
//! JSON-RPC stdio transport and an HTTP/SSE variant; it is a separate crate
//! so library consumers don't pull the server stack.
//!
//! ## Quick start
//!
//! ```no_run
//! use anchora::config::EngineConfig;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_path("anchora.yaml")?;
//! config.validate()?;
//! println!("data dir: {}", config.data_dir.display());
//! # Ok(())
//! # }
//! ```
//!
//! The bundle config describes every layer (storage, embedding, retrieval,
//! sessions, indexing, audit, budget) in one YAML document; see
//! [`config::EngineConfig`] for the full schema and defaults.

pub mod config;

pub use budget;
pub use entity;
pub use ground;
pub use resolve;
pub use session;
pub use store;
pub use vector;

pub use config::{ConfigError, EngineConfig};

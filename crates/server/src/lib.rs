//! anchora serving layer.
//!
//! Exposes the retrieval and grounding engine over a tool-call protocol:
//! line-framed JSON-RPC 2.0 on stdio (one JSON object per line, UTF-8, BOM
//! tolerated on input, nothing but frames on stdout), and the same handler
//! set over HTTP with a server-sent-events channel.
//!
//! The layer owns exactly one [`CoreContext`] — the composition root holding
//! the snapshot, vector engine, session manager, entity intelligence, world
//! model, and token budget — constructed at startup and lent to handlers by
//! reference. Handlers never panic across the dispatch boundary: every
//! failure becomes a structured `{_meta: {error: true, reason}}` envelope,
//! and a per-request deadline turns overruns into `reason = "timeout"`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = server::load_config(None)?;
//!     let ctx = Arc::new(server::CoreContext::build(config)?);
//!     server::run_stdio(ctx).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod memory_store;
pub mod protocol;
pub mod server;
pub mod skills;
pub mod state;
pub mod tools;

pub use config::load_config;
pub use error::{ErrorReason, ToolError, ToolResponse, ToolResult};
pub use http::build_router;
pub use server::{init_tracing, run_http, run_stdio};
pub use state::CoreContext;

//! # anchora session memory
//!
//! Conversation state for the retrieval engine: an append-only JSON-per-line
//! turn log with a metadata sidecar per session on disk, and two in-memory
//! policies layered on top of it.
//!
//! - [`SlidingMemory`] keeps the last `max_turns` turns verbatim and forgets
//!   everything older. Predictable and cheap; the right default for bugfix
//!   style sessions where only recent context matters.
//! - [`SummarisingMemory`] keeps the last `keep_last` turns verbatim and
//!   folds older turns into an append-only summary string. The summariser is
//!   pluggable; the default is a rule-based digest of entities, files, time
//!   range, and leading queries.
//!
//! The log is the source of truth: crash recovery is replaying it through
//! the policy, and the on-disk `turn_count` increases monotonically even as
//! a sliding policy drops turns from memory. [`SessionManager`] owns the
//! cache of live policy instances behind per-session locks; two different
//! sessions never contend.

mod error;
mod manager;
mod memory;
mod store;
mod types;

pub use error::{SessionError, SessionResult};
pub use manager::{SessionDefaults, SessionManager, SessionSummary};
pub use memory::{
    default_summarizer, HistorySearch, SessionMemory, SlidingMemory, SummarisingMemory, Summarizer,
};
pub use store::SessionStore;
pub use types::{MemoryPolicy, SessionKind, SessionMetadata, TurnMetadata, TurnRecord};

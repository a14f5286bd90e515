//! # anchora entity intelligence
//!
//! Two complementary pieces of code awareness:
//!
//! - [`EntityIndex`] — a name-addressable store of [`EntityRecord`]s
//!   (functions, classes, constants, endpoints) extracted from source trees
//!   by regex line scanners behind the [`SourceScanner`] seam. Rebuildable
//!   at any time from source; serialisable to `entities.json`.
//! - [`EntityTracker`] — a record of *where the conversation mentioned*
//!   those entities: one [`EntityMention`] per verbatim match in a turn,
//!   with a snippet of surrounding text, queryable by name, recency, and
//!   session co-occurrence.
//!
//! The index answers "what exists in the code"; the tracker answers "what
//! were we just talking about". The contextual resolver consumes both.

mod error;
mod index;
mod scan;
mod tracker;
mod types;

pub use error::{EntityError, EntityResult};
pub use index::{EntityIndex, IndexStats};
pub use scan::{JsScanner, PythonScanner, RustScanner, SourceScanner};
pub use tracker::{EntityTracker, TrackerStats};
pub use types::{EntityKind, EntityMention, EntityRecord};

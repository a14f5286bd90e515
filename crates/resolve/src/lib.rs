//! # anchora contextual resolution
//!
//! Queries from an agent mid-conversation are full of anaphora: "rewrite
//! that function", "is it still failing", "the previous bug". This crate
//! detects those referential phrases ([`ReferenceDetector`]) and rewrites
//! them to concrete entity names ([`ContextualResolver`]) using three
//! evidence sources in priority order: the session's own history, the
//! cross-session mention tracker, and — only when unambiguous — the code
//! entity index.
//!
//! Detection is rule-based over English and Spanish phrasing; a phrase only
//! counts as a reference when its head noun names a code-domain concept
//! (function, class, bug, file, ...). Every resolution carries a confidence
//! derived from the detection confidence and the evidence source, and the
//! resolver reports exactly what it replaced so the caller can surface it as
//! provenance.

mod detector;
mod resolver;

pub use detector::{Reference, ReferenceDetector, ReferenceType};
pub use resolver::{ContextualResolver, ResolvedReference};

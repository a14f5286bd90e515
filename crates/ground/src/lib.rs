//! # anchora grounding
//!
//! The engine's defence against plausible-but-wrong answers. A directory of
//! "project truth" documents (requirements, rules, architecture notes) is
//! split into heading-delimited sections and embedded into a [`WorldModel`]
//! held entirely in memory. Two consumers sit on top:
//!
//! - [`Auditor`] scores a candidate answer against the model: the facts most
//!   relevant to the query become *anchors*, their similarity-weighted
//!   average is the *ideal latent state*, and the proposal's cosine to that
//!   ideal — minus a penalty per contradicted anchor — becomes the final
//!   consistency score and status.
//! - [`GroundingProvider`] returns the top-scoring fact sections verbatim,
//!   formatted as an evidence block a caller can cite.
//!
//! The similarity thresholds are deliberately configuration
//! ([`AuditConfig`]): they gate trusted/suspicious/hallucination verdicts
//! and deployments tune them against their own corpus.

mod audit;
mod error;
mod evidence;
mod facts;

pub use audit::{AuditConfig, AuditReport, AuditStatus, Auditor};
pub use error::{GroundError, GroundResult};
pub use evidence::{GroundingProvider, NO_EVIDENCE_TEXT};
pub use facts::{TruthFact, WorldModel};

//! Evidence blocks: the top truth-fact sections for a query, formatted for
//! citation.

use std::sync::Arc;

use vector::{cosine_similarity, Embedder};

use crate::facts::WorldModel;

/// Returned when the corpus is empty or nothing clears the threshold.
pub const NO_EVIDENCE_TEXT: &str =
    "No factual evidence found in the project context for this query.";

/// Retrieves top-k evidence sections from the world model.
pub struct GroundingProvider {
    embedder: Arc<dyn Embedder>,
    /// Sections must clear this cosine with the query to count as evidence.
    threshold: f32,
}

impl GroundingProvider {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            threshold: 0.5,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// The top-`top_k` sections above the threshold, concatenated with
    /// per-section headers carrying source and score. Returns
    /// [`NO_EVIDENCE_TEXT`] when nothing qualifies.
    pub fn evidence(&self, model: &WorldModel, query: &str, top_k: usize) -> String {
        if model.is_empty() {
            return NO_EVIDENCE_TEXT.to_string();
        }

        let query_vec = self.embedder.embed(query);
        let mut scored: Vec<(f32, usize)> = model
            .facts()
            .iter()
            .enumerate()
            .map(|(i, fact)| (cosine_similarity(&query_vec, &fact.vector), i))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let blocks: Vec<String> = scored
            .into_iter()
            .take(top_k)
            .filter(|(score, _)| *score > self.threshold)
            .map(|(score, idx)| {
                let fact = &model.facts()[idx];
                format!(
                    "--- Evidence from {} (score: {score:.2}) ---\n{}",
                    fact.source, fact.content
                )
            })
            .collect();

        if blocks.is_empty() {
            tracing::debug!(query, "no evidence cleared the threshold");
            return NO_EVIDENCE_TEXT.to_string();
        }
        blocks.join("\n\n")
    }
}

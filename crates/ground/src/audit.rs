//! Scoring a proposal's divergence from the world model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vector::{cosine_similarity, Embedder};

use crate::facts::WorldModel;

/// Thresholds and penalties for the audit. The defaults reproduce the
/// engine's historical behaviour; tune them against your own corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Facts must clear this cosine with the query to become anchors.
    pub anchor_threshold: f32,
    /// An anchor whose cosine with the proposal falls below this is a
    /// contradiction.
    pub contradiction_threshold: f32,
    /// Score multiplier lost per contradiction.
    pub contradiction_penalty: f32,
    /// How many top facts may become anchors.
    pub max_anchors: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            anchor_threshold: 0.5,
            contradiction_threshold: 0.4,
            contradiction_penalty: 0.2,
            max_anchors: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Trusted,
    Suspicious,
    HallucinationDetected,
    /// No relevant facts; the proposal is neither endorsed nor flagged.
    Unverified,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Trusted => "trusted",
            AuditStatus::Suspicious => "suspicious",
            AuditStatus::HallucinationDetected => "hallucination_detected",
            AuditStatus::Unverified => "unverified",
        }
    }
}

/// The audit verdict, returned verbatim through the tool surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Final consistency score in `[0, 1]`.
    pub score: f32,
    /// Cosine between the proposal and the ideal latent state.
    pub alignment: f32,
    pub status: AuditStatus,
    /// Source files of the anchor facts, most relevant first.
    pub anchors: Vec<String>,
    pub contradictions: Vec<String>,
    pub message: String,
}

/// Audits proposals against a [`WorldModel`].
pub struct Auditor {
    embedder: Arc<dyn Embedder>,
    config: AuditConfig,
}

impl Auditor {
    pub fn new(embedder: Arc<dyn Embedder>, config: AuditConfig) -> Self {
        Self { embedder, config }
    }

    /// Audit `proposal` as an answer to `query`:
    ///
    /// 1. Rank all facts by cosine to the query; the top few above the
    ///    anchor threshold become anchors. No anchors → `Unverified` with a
    ///    neutral score of 1.0.
    /// 2. The anchor-cosine-weighted average of anchor vectors is the ideal
    ///    latent state; `alignment` is the proposal's cosine to it.
    /// 3. Each anchor the proposal diverges from records a contradiction.
    /// 4. `score = clamp(alignment × (1 − penalty × contradictions), 0, 1)`,
    ///    mapped to a status.
    pub fn audit(&self, model: &WorldModel, query: &str, proposal: &str) -> AuditReport {
        if model.is_empty() {
            return unverified();
        }

        let query_vec = self.embedder.embed(query);
        let proposal_vec = self.embedder.embed(proposal);

        let mut ranked: Vec<(f32, usize)> = model
            .facts()
            .iter()
            .enumerate()
            .map(|(i, fact)| (cosine_similarity(&query_vec, &fact.vector), i))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let anchors: Vec<(f32, usize)> = ranked
            .into_iter()
            .take(self.config.max_anchors)
            .filter(|(sim, _)| *sim > self.config.anchor_threshold)
            .collect();

        if anchors.is_empty() {
            return unverified();
        }

        // Ideal latent state: relevance-weighted average of anchor vectors.
        let dim = self.embedder.dimension();
        let mut ideal = vec![0f32; dim];
        let mut total_weight = 0f32;
        for (weight, idx) in &anchors {
            for (acc, v) in ideal.iter_mut().zip(&model.facts()[*idx].vector) {
                *acc += v * weight;
            }
            total_weight += weight;
        }
        if total_weight > 0.0 {
            for v in ideal.iter_mut() {
                *v /= total_weight;
            }
        }

        let alignment = cosine_similarity(&proposal_vec, &ideal);

        let mut contradictions = Vec::new();
        for (_, idx) in &anchors {
            let fact = &model.facts()[*idx];
            if cosine_similarity(&proposal_vec, &fact.vector) < self.config.contradiction_threshold {
                contradictions.push(format!(
                    "Proposal contradicts or ignores rules in '{}'",
                    fact.source
                ));
            }
        }

        let score = (alignment
            * (1.0 - self.config.contradiction_penalty * contradictions.len() as f32))
            .clamp(0.0, 1.0);

        let status = if score < 0.4 {
            AuditStatus::HallucinationDetected
        } else if score < 0.5 || !contradictions.is_empty() {
            AuditStatus::Suspicious
        } else {
            AuditStatus::Trusted
        };

        tracing::info!(
            score,
            alignment,
            anchors = anchors.len(),
            contradictions = contradictions.len(),
            status = status.as_str(),
            "audited proposal"
        );

        AuditReport {
            score,
            alignment,
            status,
            anchors: anchors
                .iter()
                .map(|(_, idx)| model.facts()[*idx].source.clone())
                .collect(),
            contradictions,
            message: format!("Factual consistency: {score:.2}. Status: {}", status.as_str()),
        }
    }
}

fn unverified() -> AuditReport {
    AuditReport {
        score: 1.0,
        alignment: 0.0,
        status: AuditStatus::Unverified,
        anchors: Vec::new(),
        contradictions: Vec::new(),
        message: "No project context available for audit.".to_string(),
    }
}

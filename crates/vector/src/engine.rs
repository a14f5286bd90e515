//! The composed engine: embedder + ANN index + multi-vector retrieval.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ann::AnnIndex;
use crate::embed::Embedder;
use crate::error::{VectorError, VectorResult};
use crate::expand::expand_query;

/// Reciprocal-rank fusion constant; the conventional value.
const RRF_K: f32 = 60.0;

/// One retrieval hit. `score` is the best raw cosine observed for the chunk
/// across all fused query variants, so downstream thresholds keep operating
/// in cosine space even when ranking came from fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub chunk_id: u32,
    pub score: f32,
}

/// Embedding plus approximate search over one snapshot's vector set.
///
/// Read-only after construction; shared freely across request handlers.
pub struct VectorEngine {
    embedder: Arc<dyn Embedder>,
    index: AnnIndex,
    /// Number of query variants used by multi-vector retrieval.
    max_expansions: usize,
}

impl std::fmt::Debug for VectorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorEngine")
            .field("model_id", &self.embedder.model_id())
            .field("max_expansions", &self.max_expansions)
            .finish()
    }
}

impl VectorEngine {
    /// Pair an embedder with an index.
    ///
    /// `snapshot_model` is the model identifier recorded in the snapshot that
    /// produced the index; construction is refused when it disagrees with
    /// the embedder, since mixed-model similarities are meaningless.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: AnnIndex,
        snapshot_model: &str,
    ) -> VectorResult<Self> {
        if embedder.model_id() != snapshot_model {
            return Err(VectorError::IncompatibleIndex {
                snapshot: snapshot_model.to_string(),
                engine: embedder.model_id().to_string(),
            });
        }
        if !index.is_empty() && index.dimension() != embedder.dimension() {
            return Err(VectorError::DimensionMismatch {
                expected: embedder.dimension(),
                got: index.dimension(),
            });
        }
        Ok(Self {
            embedder,
            index,
            max_expansions: 3,
        })
    }

    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions.max(1);
        self
    }

    pub fn embed_query(&self, text: &str) -> Vec<f32> {
        self.embedder.embed(text)
    }

    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn num_vectors(&self) -> usize {
        self.index.len()
    }

    /// Plain top-k over a pre-embedded query.
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<SearchHit>> {
        Ok(self
            .index
            .search(query, k)?
            .into_iter()
            .map(|(chunk_id, score)| SearchHit { chunk_id, score })
            .collect())
    }

    /// Multi-vector retrieval: embed the query plus rule-based expansions,
    /// search each, and merge with reciprocal-rank fusion. Results are
    /// deduplicated on chunk id; ranking follows the fused score with ties
    /// broken by the smaller chunk id; each hit reports its best raw cosine.
    ///
    /// Returns the hits and the list of query variants that were searched.
    pub fn search_with_mvr(&self, text: &str, k: usize) -> VectorResult<(Vec<SearchHit>, Vec<String>)> {
        let variants = expand_query(text, self.max_expansions);

        // chunk_id -> (fused score, best raw cosine)
        let mut fused: HashMap<u32, (f32, f32)> = HashMap::new();
        for variant in &variants {
            let q = self.embedder.embed(variant);
            for (rank, (chunk_id, score)) in self.index.search(&q, k)?.into_iter().enumerate() {
                let entry = fused.entry(chunk_id).or_insert((0.0, f32::MIN));
                entry.0 += 1.0 / (RRF_K + rank as f32 + 1.0);
                entry.1 = entry.1.max(score);
            }
        }

        let mut hits: Vec<(u32, f32, f32)> = fused
            .into_iter()
            .map(|(chunk_id, (fused, best))| (chunk_id, fused, best))
            .collect();
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);

        Ok((
            hits.into_iter()
                .map(|(chunk_id, _, best)| SearchHit {
                    chunk_id,
                    score: best,
                })
                .collect(),
            variants,
        ))
    }
}

/// Raw cosine similarity for ad-hoc scoring (world-model audit, grounding).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ann::AnnConfig;
    use crate::embed::{l2_normalize_in_place, HashEmbedder};

    /// Embedder that answers from a fixed table, so tests control geometry.
    struct TableEmbedder {
        dimension: usize,
        rows: Vec<(String, Vec<f32>)>,
        fallback: Vec<f32>,
    }

    impl TableEmbedder {
        fn new(dimension: usize, rows: Vec<(&str, Vec<f32>)>) -> Self {
            let rows = rows
                .into_iter()
                .map(|(text, mut v)| {
                    l2_normalize_in_place(&mut v);
                    (text.to_string(), v)
                })
                .collect();
            let mut fallback = vec![0.0; dimension];
            fallback[dimension - 1] = 1.0;
            Self {
                dimension,
                rows,
                fallback,
            }
        }
    }

    impl Embedder for TableEmbedder {
        fn embed(&self, text: &str) -> Vec<f32> {
            self.rows
                .iter()
                .find(|(t, _)| t == text)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| self.fallback.clone())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_id(&self) -> &str {
            "table-test"
        }
    }

    fn engine_over(rows: &[f32], embedder: Arc<dyn Embedder>, model: &str) -> VectorEngine {
        let index = AnnIndex::build(embedder.dimension(), rows, AnnConfig::default()).unwrap();
        VectorEngine::new(embedder, index, model).unwrap()
    }

    #[test]
    fn model_mismatch_is_refused() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(8));
        let index = AnnIndex::build(8, &[], AnnConfig::default()).unwrap();
        let err = VectorEngine::new(embedder, index, "other-model").unwrap_err();
        assert!(matches!(err, VectorError::IncompatibleIndex { .. }));
    }

    #[test]
    fn search_ranks_by_cosine() {
        let embedder: Arc<dyn Embedder> = Arc::new(TableEmbedder::new(
            3,
            vec![("login query", vec![1.0, 0.2, 0.0])],
        ));
        // Row 0 near the query, row 1 orthogonal.
        let rows = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let engine = engine_over(&rows, embedder, "table-test");

        let q = engine.embed_query("login query");
        let hits = engine.search(&q, 2).unwrap();
        assert_eq!(hits[0].chunk_id, 0);
        assert!(hits[0].score > 0.9);
        assert!(hits[1].score < 0.3);
    }

    #[test]
    fn mvr_deduplicates_and_reports_variants() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(16));
        let mut rows = Vec::new();
        for i in 0..4 {
            let mut row = vec![0.1f32; 16];
            row[i] = 1.0;
            l2_normalize_in_place(&mut row);
            rows.extend(row);
        }
        let engine = engine_over(&rows, embedder, "hash-sin-16");

        let (hits, variants) = engine.search_with_mvr("how does the login_handler work", 3).unwrap();
        assert!(!variants.is_empty());
        assert_eq!(variants[0], "how does the login_handler work");
        assert!(hits.len() <= 3);
        let mut ids: Vec<u32> = hits.iter().map(|h| h.chunk_id).collect();
        ids.dedup();
        assert_eq!(ids.len(), hits.len());
    }

    #[test]
    fn mvr_scores_stay_in_cosine_space() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(16));
        let mut row = embedder.embed("exact text");
        l2_normalize_in_place(&mut row);
        let engine = engine_over(&row.clone(), embedder, "hash-sin-16");

        let (hits, _) = engine.search_with_mvr("exact text", 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.999, "score {}", hits[0].score);
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}

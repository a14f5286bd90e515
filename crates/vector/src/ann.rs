//! Approximate cosine top-k over a fixed vector set.
//!
//! Hierarchical Navigable Small World graphs give sub-linear search, but the
//! graph only pays for itself on larger sets; below
//! [`AnnConfig::min_vectors_for_hnsw`] the index answers with an exact
//! linear scan instead, which also guarantees the true top result on small
//! sets. Chunk ids are the dense insertion positions `[0, N)`, so no id
//! mapping is kept.
//!
//! The serialised blob carries the build parameters and the flat vector
//! matrix; deserialisation rebuilds the graph, which is deterministic given
//! the same vectors and parameters. The blob does not encode the vector
//! count — callers pass it explicitly and it is cross-checked.

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{VectorError, VectorResult};

/// HNSW build/search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnConfig {
    /// Neighbors per node (higher = better recall, slower build).
    pub m: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
    /// Candidate list size during search.
    pub ef_search: usize,
    /// Below this vector count the index uses an exact linear scan.
    pub min_vectors_for_hnsw: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            min_vectors_for_hnsw: 1000,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct AnnBlob {
    dimension: u32,
    config: AnnConfig,
    flat: Vec<f32>,
}

/// Cosine ANN index over dense ids `[0, N)`.
pub struct AnnIndex {
    config: AnnConfig,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
}

impl AnnIndex {
    /// Build an index over `n` row-major vectors.
    pub fn build(dimension: usize, rows: &[f32], config: AnnConfig) -> VectorResult<Self> {
        if dimension == 0 || rows.len() % dimension.max(1) != 0 {
            return Err(VectorError::DimensionMismatch {
                expected: dimension,
                got: rows.len(),
            });
        }
        let vectors: Vec<Vec<f32>> = rows.chunks_exact(dimension).map(|r| r.to_vec()).collect();
        let mut index = Self {
            config,
            dimension,
            vectors,
            hnsw: None,
        };
        index.build_graph();
        Ok(index)
    }

    fn build_graph(&mut self) {
        let nb_elem = self.vectors.len();
        if nb_elem < self.config.min_vectors_for_hnsw {
            // Linear scan territory; keep the graph unbuilt.
            return;
        }

        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            self.config.m,
            nb_elem,
            nb_layer,
            self.config.ef_construction,
            DistCosine {},
        );

        let data_for_insertion: Vec<(&Vec<f32>, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vec)| (vec, idx))
            .collect();
        hnsw.parallel_insert(&data_for_insertion);

        tracing::debug!(vectors = nb_elem, layers = nb_layer, "built HNSW graph");
        self.hnsw = Some(hnsw);
    }

    /// Top-`k` ids with raw cosine scores, descending; ties broken by the
    /// smaller id.
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<(u32, f32)>> {
        if query.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut hits = match &self.hnsw {
            Some(hnsw) => {
                let ef = self.config.ef_search.max(k);
                let neighbours: Vec<Neighbour> = hnsw.search(query, k, ef);
                neighbours
                    .into_iter()
                    .map(|n| (n.get_origin_id() as u32, 1.0 - n.distance))
                    .collect::<Vec<_>>()
            }
            None => self.linear_search(query, k),
        };

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn linear_search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let mut scored: Vec<(u32, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, v)| (idx as u32, cosine(query, v)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Opaque blob for the snapshot container.
    pub fn serialize(&self) -> VectorResult<Vec<u8>> {
        let flat: Vec<f32> = self.vectors.iter().flatten().copied().collect();
        let blob = AnnBlob {
            dimension: self.dimension as u32,
            config: self.config,
            flat,
        };
        Ok(encode_to_vec(&blob, standard())?)
    }

    /// Reconstruct a working index from a blob. The wire format does not
    /// encode `n`, so it is passed explicitly and cross-checked.
    pub fn deserialize(bytes: &[u8], n: usize) -> VectorResult<Self> {
        let (blob, _): (AnnBlob, usize) = decode_from_slice(bytes, standard())?;
        let dimension = blob.dimension as usize;
        if dimension == 0 {
            return Err(VectorError::Decode("zero dimension in blob".to_string()));
        }
        let declared = blob.flat.len() / dimension;
        if declared != n || blob.flat.len() % dimension != 0 {
            return Err(VectorError::CountMismatch {
                declared,
                expected: n,
            });
        }
        Self::build(dimension, &blob.flat, blob.config)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
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

    fn axis_rows() -> Vec<f32> {
        // Three orthogonal unit vectors in R^3.
        vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
    }

    #[test]
    fn linear_search_returns_true_top() {
        let index = AnnIndex::build(3, &axis_rows(), AnnConfig::default()).unwrap();
        let hits = index.search(&[0.9, 0.1, 0.0], 2).unwrap();
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn scores_are_descending_and_in_range() {
        let index = AnnIndex::build(3, &axis_rows(), AnnConfig::default()).unwrap();
        let hits = index.search(&[0.5, 0.5, 0.1], 3).unwrap();
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        for (_, score) in hits {
            assert!((-1.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn ties_break_on_smaller_id() {
        // Two identical rows: id 0 must come first.
        let rows = vec![1.0, 0.0, 1.0, 0.0];
        let index = AnnIndex::build(2, &rows, AnnConfig::default()).unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 1);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = AnnIndex::build(3, &[], AnnConfig::default()).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = AnnIndex::build(3, &axis_rows(), AnnConfig::default()).unwrap();
        let err = index.search(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
    }

    #[test]
    fn blob_round_trip_preserves_results() {
        let index = AnnIndex::build(3, &axis_rows(), AnnConfig::default()).unwrap();
        let blob = index.serialize().unwrap();
        let restored = AnnIndex::deserialize(&blob, 3).unwrap();

        let q = [0.7, 0.2, 0.1];
        assert_eq!(index.search(&q, 3).unwrap(), restored.search(&q, 3).unwrap());
    }

    #[test]
    fn blob_count_mismatch_is_rejected() {
        let index = AnnIndex::build(3, &axis_rows(), AnnConfig::default()).unwrap();
        let blob = index.serialize().unwrap();
        let err = AnnIndex::deserialize(&blob, 7).unwrap_err();
        assert!(matches!(
            err,
            VectorError::CountMismatch {
                declared: 3,
                expected: 7
            }
        ));
    }

    #[test]
    fn hnsw_path_finds_true_top() {
        // Force the graph on a small set and verify the exact top-1 is found.
        let config = AnnConfig {
            min_vectors_for_hnsw: 1,
            ..AnnConfig::default()
        };
        let mut rows = Vec::new();
        for i in 0..64 {
            let mut row = vec![0.0f32; 8];
            row[i % 8] = 1.0;
            row[(i + 1) % 8] = (i as f32 * 0.01).sin().abs();
            crate::embed::l2_normalize_in_place(&mut row);
            rows.extend(row);
        }
        let index = AnnIndex::build(8, &rows, config).unwrap();
        assert!(index.hnsw.is_some());

        let query: Vec<f32> = rows[0..8].to_vec();
        let hits = index.search(&query, 1).unwrap();
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 > 0.99);
    }

    #[test]
    fn k_larger_than_index_returns_all() {
        let index = AnnIndex::build(3, &axis_rows(), AnnConfig::default()).unwrap();
        let hits = index.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 3);
    }
}

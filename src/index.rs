//! Vector index: nearest-neighbor search over unit embeddings.
//!
//! Cosine similarity realized as inner product over L2-normalized vectors.
//! The index is immutable after [`VectorIndex::build`]; reads are safe to
//! share because nothing can mutate a built index.

use crate::error::{RagError, Result};
use crate::provider::l2_normalize;
use crate::unit::Embedding;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One retrieved unit in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedUnit {
    /// 1-based, strictly increasing rank.
    pub rank: usize,
    /// Id of the retrieved unit.
    pub unit_id: String,
    /// Text of the retrieved unit.
    pub text: String,
    /// Similarity score that produced this ordering (descending).
    pub score: f32,
}

/// The retrieval output for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Id of the query.
    pub query_id: String,
    /// Query text.
    pub query: String,
    /// Retrieved units, best first, at most the requested top-k.
    pub retrieved: Vec<RetrievedUnit>,
}

/// An immutable similarity index over unit embeddings.
pub struct VectorIndex {
    ids: Vec<String>,
    texts: Vec<String>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Build an index from unit embeddings.
    ///
    /// All vectors must share one dimensionality; a violation is a fatal
    /// construction error. Vectors are L2-normalized on the way in so that
    /// inner product equals cosine similarity.
    pub fn build(entries: Vec<Embedding>) -> Result<Self> {
        let first = entries
            .first()
            .ok_or_else(|| RagError::EmptyIndex("cannot build an index from zero vectors".to_string()))?;
        let dimension = first.vector.len();

        let mut ids = Vec::with_capacity(entries.len());
        let mut texts = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.vector.len(),
                });
            }
            let mut vector = entry.vector;
            l2_normalize(&mut vector);
            ids.push(entry.unit_id);
            texts.push(entry.text);
            vectors.push(vector);
        }

        debug!(vectors = vectors.len(), dimension, "built vector index");
        Ok(Self {
            ids,
            texts,
            vectors,
            dimension,
        })
    }

    /// Search for the `top_k` most similar units.
    ///
    /// Returns at most `top_k` results; an index holding fewer vectors
    /// returns all of them, ranked. Score ties break by insertion order so
    /// results are deterministic.
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievedUnit>> {
        if query_vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let mut query = query_vector.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .map(|v| v.iter().zip(query.iter()).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (idx, score))| RetrievedUnit {
                rank: i + 1,
                unit_id: self.ids[idx].clone(),
                text: self.texts[idx].clone(),
                score,
            })
            .collect())
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if the index is empty (never true for a built index).
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Dimensionality shared by every indexed vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vector: Vec<f32>) -> Embedding {
        Embedding::new(id, format!("text for {}", id), vector)
    }

    #[test]
    fn test_empty_build_fails() {
        assert!(matches!(
            VectorIndex::build(Vec::new()),
            Err(RagError::EmptyIndex(_))
        ));
    }

    #[test]
    fn test_mixed_dimensions_fail() {
        let result = VectorIndex::build(vec![
            entry("a", vec![1.0, 0.0]),
            entry("b", vec![1.0, 0.0, 0.0]),
        ]);
        assert!(matches!(
            result,
            Err(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_query_dimension_checked() {
        let index = VectorIndex::build(vec![entry("a", vec![1.0, 0.0])]).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(RagError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_identical_vector_ranks_first() {
        let query = vec![0.2, 0.9, 0.1, 0.4];
        let index = VectorIndex::build(vec![
            entry("v1", vec![1.0, 0.0, 0.0, 0.0]),
            entry("v2", query.clone()),
            entry("v3", vec![0.0, 0.0, 1.0, 0.0]),
            entry("v4", vec![0.5, 0.5, 0.5, 0.5]),
            entry("v5", vec![0.0, 1.0, 0.0, 1.0]),
        ])
        .unwrap();

        let results = index.search(&query, 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].unit_id, "v2");
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_fewer_vectors_than_top_k() {
        let index = VectorIndex::build(vec![
            entry("a", vec![1.0, 0.0]),
            entry("b", vec![0.0, 1.0]),
        ])
        .unwrap();
        let results = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let index = VectorIndex::build(vec![
            entry("first", vec![1.0, 0.0]),
            entry("second", vec![2.0, 0.0]), // same direction, same cosine
            entry("other", vec![0.0, 1.0]),
        ])
        .unwrap();
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].unit_id, "first");
        assert_eq!(results[1].unit_id, "second");
    }

    #[test]
    fn test_ranks_strictly_increasing() {
        let index = VectorIndex::build(vec![
            entry("a", vec![1.0, 0.0]),
            entry("b", vec![0.9, 0.1]),
            entry("c", vec![0.0, 1.0]),
        ])
        .unwrap();
        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }
}

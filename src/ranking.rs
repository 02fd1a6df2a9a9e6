//! Ranking policy for ground-truth construction.
//!
//! Two interchangeable strategies, chosen by capability availability rather
//! than user configuration:
//! 1. pairwise relevance scoring of every (query, candidate) pair, when a
//!    [`RelevanceScorer`] is available;
//! 2. embedding cosine similarity, as the resilience fallback.
//!
//! A scorer that fails mid-call (timeout, transport error) also falls back
//! for that query instead of failing the run.

use crate::error::Result;
use crate::index::RetrievedUnit;
use crate::provider::{EmbeddingProvider, RelevanceScorer, cosine_similarity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// One unit in a reference ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUnit {
    /// 1-based rank.
    pub rank: usize,
    /// Id of the ranked unit.
    pub unit_id: String,
    /// Relevance or similarity score that produced the order.
    pub score: f32,
}

/// Produces a total order over candidate units for a query.
pub struct RankingPolicy {
    embedder: Arc<dyn EmbeddingProvider>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
}

impl RankingPolicy {
    /// Similarity-only policy (no pairwise scorer available).
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            scorer: None,
        }
    }

    /// Policy that prefers a pairwise relevance scorer.
    pub fn with_scorer(
        embedder: Arc<dyn EmbeddingProvider>,
        scorer: Arc<dyn RelevanceScorer>,
    ) -> Self {
        Self {
            embedder,
            scorer: Some(scorer),
        }
    }

    /// Whether the preferred pairwise strategy is available.
    pub fn has_scorer(&self) -> bool {
        self.scorer.is_some()
    }

    /// Rank candidates for a query, best first, ties broken by original
    /// candidate order. An empty candidate list yields an empty ranking.
    pub async fn rank(&self, query: &str, candidates: &[RetrievedUnit]) -> Result<Vec<RankedUnit>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let scores = match &self.scorer {
            Some(scorer) => match self.score_pairwise(scorer.as_ref(), query, candidates).await {
                Ok(scores) => {
                    debug!(candidates = candidates.len(), "ranked with pairwise scorer");
                    scores
                }
                Err(err) => {
                    warn!(%err, "pairwise scorer failed, falling back to cosine similarity");
                    self.score_similarity(query, candidates).await?
                }
            },
            None => self.score_similarity(query, candidates).await?,
        };

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        Ok(order
            .into_iter()
            .enumerate()
            .map(|(i, idx)| RankedUnit {
                rank: i + 1,
                unit_id: candidates[idx].unit_id.clone(),
                score: scores[idx],
            })
            .collect())
    }

    async fn score_pairwise(
        &self,
        scorer: &dyn RelevanceScorer,
        query: &str,
        candidates: &[RetrievedUnit],
    ) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            scores.push(scorer.score(query, &candidate.text).await?);
        }
        Ok(scores)
    }

    async fn score_similarity(
        &self,
        query: &str,
        candidates: &[RetrievedUnit],
    ) -> Result<Vec<f32>> {
        let query_embedding = self.embedder.embed_one(query).await?;
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let candidate_embeddings = self.embedder.embed(&texts).await?;

        Ok(candidate_embeddings
            .iter()
            .map(|e| cosine_similarity(&query_embedding, e))
            .collect())
    }
}

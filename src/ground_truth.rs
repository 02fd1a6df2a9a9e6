//! Reference-ranking ("ground truth") construction.
//!
//! A thin orchestrator over [`RankingPolicy`]: reranks each query's
//! retrieved candidates, assigns 1-based ranks, and designates the top-N as
//! relevant. A run writes a fresh ground-truth file; an existing one is
//! never mutated, so prior evaluation results stay intact.

use crate::error::Result;
use crate::index::RetrievalResult;
use crate::ranking::{RankedUnit, RankingPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Reference ranking for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthEntry {
    /// Query text.
    pub query: String,
    /// The top-N unit ids designated relevant for metric computation.
    pub relevant_unit_ids: Vec<String>,
    /// The full reference ranking, best first.
    pub ranked: Vec<RankedUnit>,
}

/// Ground truth for a run, keyed by query id.
pub type GroundTruth = BTreeMap<String, GroundTruthEntry>;

/// Builds ground truth from retrieval results via a [`RankingPolicy`].
pub struct GroundTruthBuilder {
    policy: RankingPolicy,
    relevant_top_n: usize,
}

impl GroundTruthBuilder {
    /// Create a builder. `relevant_top_n` controls how many of the
    /// best-ranked units count as relevant (default 5 in config).
    pub fn new(policy: RankingPolicy, relevant_top_n: usize) -> Self {
        Self {
            policy,
            relevant_top_n,
        }
    }

    /// Build ground truth for a batch of retrieval results.
    ///
    /// Queries with zero candidates are skipped: no entry is emitted and no
    /// error is raised.
    pub async fn build(&self, results: &[RetrievalResult]) -> Result<GroundTruth> {
        let mut ground_truth = GroundTruth::new();
        let mut skipped = 0usize;

        for result in results {
            if result.retrieved.is_empty() {
                debug!(query_id = %result.query_id, "no candidates, skipping ground truth");
                skipped += 1;
                continue;
            }

            let ranked = self.policy.rank(&result.query, &result.retrieved).await?;
            let relevant_unit_ids = ranked
                .iter()
                .take(self.relevant_top_n)
                .map(|r| r.unit_id.clone())
                .collect();

            ground_truth.insert(
                result.query_id.clone(),
                GroundTruthEntry {
                    query: result.query.clone(),
                    relevant_unit_ids,
                    ranked,
                },
            );
        }

        info!(
            entries = ground_truth.len(),
            skipped, "ground truth built"
        );
        Ok(ground_truth)
    }
}

//! Retrieval-quality and answer-quality metrics.
//!
//! Rank metrics (precision@k, recall@k, MRR, NDCG@k) are pure functions over
//! id sequences. Answer metrics (faithfulness, completeness, hallucination)
//! go through the embedding capability; answer-vs-reference metrics (BLEU,
//! ROUGE-L, learned semantic similarity) are delegated to an optional
//! [`ReferenceScorer`] rather than reimplemented here.

use crate::error::{RagError, Result};
use crate::ground_truth::GroundTruth;
use crate::index::RetrievalResult;
use crate::provider::{EmbeddingProvider, ReferenceScorer, cosine_similarity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-query mapping from metric name to value.
pub type MetricRecord = BTreeMap<String, f64>;

/// Aggregated metric means plus contribution counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Arithmetic mean per metric name over all scored queries.
    pub mean: MetricRecord,
    /// Number of queries that contributed to the means.
    pub scored_queries: usize,
    /// Number of queries skipped (no usable ground truth / empty context).
    pub skipped_queries: usize,
}

/// Full retrieval evaluation output: per-query records and the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalEvaluation {
    /// Per-query metric records, keyed by query id.
    pub per_query: BTreeMap<String, MetricRecord>,
    /// Aggregate summary.
    pub summary: EvaluationSummary,
}

/// A generated answer to evaluate, with its retrieval context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Id of the query this answer responds to.
    pub query_id: String,
    /// Query text.
    pub query: String,
    /// The generated answer.
    pub answer: String,
    /// Retrieved context texts the answer was generated from.
    pub context: Vec<String>,
    /// Reference answer, when the dataset provides one.
    pub reference_answer: Option<String>,
}

/// Precision@k: fraction of the first k retrieved ids that are relevant.
/// Returns 0 when `k == 0`.
pub fn precision_at_k(ground_truth_ids: &[String], retrieved_ids: &[String], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let relevant: HashSet<&String> = ground_truth_ids.iter().collect();
    let hits = retrieved_ids
        .iter()
        .take(k)
        .filter(|id| relevant.contains(id))
        .count();
    hits as f64 / k as f64
}

/// Recall@k: fraction of relevant ids found in the first k retrieved.
/// Returns 0 when the ground truth is empty (not NaN).
pub fn recall_at_k(ground_truth_ids: &[String], retrieved_ids: &[String], k: usize) -> f64 {
    if ground_truth_ids.is_empty() {
        return 0.0;
    }
    let relevant: HashSet<&String> = ground_truth_ids.iter().collect();
    let hits = retrieved_ids
        .iter()
        .take(k)
        .filter(|id| relevant.contains(id))
        .count();
    hits as f64 / ground_truth_ids.len() as f64
}

/// Reciprocal rank of the first relevant hit, or 0 if none.
pub fn mrr(ground_truth_ids: &[String], retrieved_ids: &[String]) -> f64 {
    let relevant: HashSet<&String> = ground_truth_ids.iter().collect();
    for (i, id) in retrieved_ids.iter().enumerate() {
        if relevant.contains(id) {
            return 1.0 / (i + 1) as f64;
        }
    }
    0.0
}

/// NDCG@k with binary relevance: DCG over the first k retrieved positions,
/// normalized by the ideal DCG over `min(k, |ground_truth|)` positions.
/// Returns 0 when the ideal DCG is 0.
pub fn ndcg_at_k(ground_truth_ids: &[String], retrieved_ids: &[String], k: usize) -> f64 {
    let relevant: HashSet<&String> = ground_truth_ids.iter().collect();

    let dcg: f64 = retrieved_ids
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, id)| relevant.contains(id))
        .map(|(i, _)| 1.0 / ((i + 2) as f64).log2())
        .sum();

    let idcg: f64 = (0..k.min(ground_truth_ids.len()))
        .map(|i| 1.0 / ((i + 2) as f64).log2())
        .sum();

    if idcg > 0.0 { dcg / idcg } else { 0.0 }
}

/// Clip a similarity to `[0, 1]` for reporting.
fn clip01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Arithmetic mean per metric name over a set of records. Commutative, so
/// the result does not depend on query processing order.
pub fn aggregate_mean<'a, I>(records: I) -> MetricRecord
where
    I: IntoIterator<Item = &'a MetricRecord>,
{
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in records {
        for (name, value) in record {
            let entry = sums.entry(name.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(name, (sum, count))| (name, sum / count as f64))
        .collect()
}

/// Computes retrieval and answer metrics and their aggregates.
pub struct MetricsEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    reference_scorer: Option<Arc<dyn ReferenceScorer>>,
}

impl MetricsEngine {
    /// Engine without a reference scorer: reference-answer metrics are
    /// omitted from records.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            reference_scorer: None,
        }
    }

    /// Engine with an external NLP-metric capability for answer-vs-reference
    /// scoring.
    pub fn with_reference_scorer(
        embedder: Arc<dyn EmbeddingProvider>,
        scorer: Arc<dyn ReferenceScorer>,
    ) -> Self {
        Self {
            embedder,
            reference_scorer: Some(scorer),
        }
    }

    /// Evaluate retrieval quality against ground truth at cutoff `k`.
    ///
    /// Queries whose ground truth is missing or empty are skipped and
    /// counted; zero usable queries yields an empty mean map, never an
    /// error.
    pub fn evaluate_retrieval(
        &self,
        results: &[RetrievalResult],
        ground_truth: &GroundTruth,
        k: usize,
    ) -> RetrievalEvaluation {
        let mut per_query = BTreeMap::new();
        let mut skipped = 0usize;

        for result in results {
            let gt_ids = ground_truth
                .get(&result.query_id)
                .map(|entry| entry.relevant_unit_ids.as_slice())
                .unwrap_or(&[]);

            if gt_ids.is_empty() {
                debug!(query_id = %result.query_id, "no ground truth, skipping");
                skipped += 1;
                continue;
            }

            let retrieved_ids: Vec<String> = result
                .retrieved
                .iter()
                .map(|r| r.unit_id.clone())
                .collect();

            let mut record = MetricRecord::new();
            record.insert(
                format!("precision@{}", k),
                precision_at_k(gt_ids, &retrieved_ids, k),
            );
            record.insert(
                format!("recall@{}", k),
                recall_at_k(gt_ids, &retrieved_ids, k),
            );
            record.insert("mrr".to_string(), mrr(gt_ids, &retrieved_ids));
            record.insert(
                format!("ndcg@{}", k),
                ndcg_at_k(gt_ids, &retrieved_ids, k),
            );

            per_query.insert(result.query_id.clone(), record);
        }

        let mean = aggregate_mean(per_query.values());
        RetrievalEvaluation {
            summary: EvaluationSummary {
                mean,
                scored_queries: per_query.len(),
                skipped_queries: skipped,
            },
            per_query,
        }
    }

    /// Evaluate one generated answer against its retrieval context and, when
    /// available, a reference answer. The context must be non-empty.
    pub async fn evaluate_answer(&self, record: &AnswerRecord) -> Result<MetricRecord> {
        let context = record.context.join(" ");
        let query_and_context = format!("{} {}", record.query, context);

        let embeddings = self
            .embedder
            .embed(&[record.answer.clone(), context, query_and_context])
            .await?;
        if embeddings.len() != 3 {
            return Err(RagError::CapabilityUnavailable(format!(
                "embedding provider returned {} vectors for 3 inputs",
                embeddings.len()
            )));
        }
        let (answer_emb, context_emb, query_context_emb) =
            (&embeddings[0], &embeddings[1], &embeddings[2]);

        let faithfulness = clip01(cosine_similarity(answer_emb, context_emb) as f64);
        let completeness = cosine_similarity(query_context_emb, answer_emb) as f64;
        let hallucination = (1.0 - faithfulness).max(0.0);

        let mut metrics = MetricRecord::new();
        metrics.insert("faithfulness".to_string(), faithfulness);
        metrics.insert("completeness".to_string(), completeness);
        metrics.insert("hallucination".to_string(), hallucination);

        if let (Some(scorer), Some(reference)) =
            (&self.reference_scorer, &record.reference_answer)
        {
            let scores = scorer.score_reference(reference, &record.answer).await?;
            metrics.insert("bleu".to_string(), scores.bleu);
            metrics.insert("rouge_l".to_string(), scores.rouge_l);
            metrics.insert("semantic_similarity".to_string(), scores.semantic);
        }

        Ok(metrics)
    }

    /// Evaluate a batch of answers. Per-query failures (including an empty
    /// context list) are caught at the query boundary and counted as
    /// skipped; they never abort the batch.
    pub async fn evaluate_answers(
        &self,
        records: &[AnswerRecord],
    ) -> (BTreeMap<String, MetricRecord>, EvaluationSummary) {
        let mut per_query = BTreeMap::new();
        let mut skipped = 0usize;

        for record in records {
            if record.context.is_empty() {
                warn!(query_id = %record.query_id, "empty context, skipping answer");
                skipped += 1;
                continue;
            }
            match self.evaluate_answer(record).await {
                Ok(metrics) => {
                    per_query.insert(record.query_id.clone(), metrics);
                }
                Err(err) => {
                    warn!(query_id = %record.query_id, %err, "answer evaluation failed, skipping");
                    skipped += 1;
                }
            }
        }

        let mean = aggregate_mean(per_query.values());
        let summary = EvaluationSummary {
            mean,
            scored_queries: per_query.len(),
            skipped_queries: skipped,
        };
        (per_query, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground_truth::GroundTruthEntry;
    use crate::index::RetrievedUnit;
    use crate::provider::ReferenceScores;
    use crate::segmenter::test_support::HashEmbedder;
    use async_trait::async_trait;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_precision_recall_ranges() {
        let gt = ids(&["a", "b"]);
        let retrieved = ids(&["a", "x", "b", "y"]);
        for k in 1..=6 {
            let p = precision_at_k(&gt, &retrieved, k);
            let r = recall_at_k(&gt, &retrieved, k);
            assert!((0.0..=1.0).contains(&p));
            assert!((0.0..=1.0).contains(&r));
        }
    }

    #[test]
    fn test_precision_zero_k() {
        assert_eq!(precision_at_k(&ids(&["a"]), &ids(&["a"]), 0), 0.0);
    }

    #[test]
    fn test_recall_empty_ground_truth() {
        assert_eq!(recall_at_k(&[], &ids(&["a", "b"]), 5), 0.0);
    }

    #[test]
    fn test_mrr_first_hit() {
        let gt = ids(&["a", "b"]);
        assert_eq!(mrr(&gt, &ids(&["a", "x"])), 1.0);
        assert_eq!(mrr(&gt, &ids(&["x", "b"])), 0.5);
        assert_eq!(mrr(&gt, &ids(&["x", "y"])), 0.0);
    }

    #[test]
    fn test_ndcg_perfect_ranking() {
        let gt = ids(&["a", "b", "c"]);
        let retrieved = ids(&["a", "b", "c"]);
        assert!((ndcg_at_k(&gt, &retrieved, 3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ndcg_empty_ground_truth() {
        assert_eq!(ndcg_at_k(&[], &ids(&["a"]), 5), 0.0);
    }

    #[test]
    fn test_worked_example() {
        // Ground truth {A,B,C}, retrieved [B, X, A], k = 5.
        let gt = ids(&["A", "B", "C"]);
        let retrieved = ids(&["B", "X", "A"]);

        assert!((precision_at_k(&gt, &retrieved, 5) - 2.0 / 5.0).abs() < 1e-12);
        assert!((recall_at_k(&gt, &retrieved, 5) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(mrr(&gt, &retrieved), 1.0);

        let dcg = 1.0 / 2.0_f64.log2() + 1.0 / 4.0_f64.log2();
        let idcg = 1.0 / 2.0_f64.log2() + 1.0 / 3.0_f64.log2() + 1.0 / 4.0_f64.log2();
        assert!((ndcg_at_k(&gt, &retrieved, 5) - dcg / idcg).abs() < 1e-12);
    }

    fn result(query_id: &str, retrieved: &[&str]) -> RetrievalResult {
        RetrievalResult {
            query_id: query_id.to_string(),
            query: format!("query {}", query_id),
            retrieved: retrieved
                .iter()
                .enumerate()
                .map(|(i, id)| RetrievedUnit {
                    rank: i + 1,
                    unit_id: id.to_string(),
                    text: String::new(),
                    score: 0.0,
                })
                .collect(),
        }
    }

    fn gt_entry(relevant: &[&str]) -> GroundTruthEntry {
        GroundTruthEntry {
            query: String::new(),
            relevant_unit_ids: ids(relevant),
            ranked: Vec::new(),
        }
    }

    fn engine() -> MetricsEngine {
        MetricsEngine::new(Arc::new(HashEmbedder::new(16)))
    }

    #[test]
    fn test_aggregate_order_invariant() {
        let engine = engine();
        let mut ground_truth = GroundTruth::new();
        ground_truth.insert("q1".to_string(), gt_entry(&["a", "b"]));
        ground_truth.insert("q2".to_string(), gt_entry(&["c"]));
        ground_truth.insert("q3".to_string(), gt_entry(&["d", "e", "f"]));

        let mut results = vec![
            result("q1", &["a", "x", "b"]),
            result("q2", &["y", "c"]),
            result("q3", &["d", "e", "z"]),
        ];

        let forward = engine.evaluate_retrieval(&results, &ground_truth, 3);
        results.reverse();
        let reversed = engine.evaluate_retrieval(&results, &ground_truth, 3);

        assert_eq!(forward.summary.scored_queries, reversed.summary.scored_queries);
        for (name, value) in &forward.summary.mean {
            let other = reversed.summary.mean[name];
            assert!(
                (value - other).abs() < 1e-9,
                "{} differs across orders",
                name
            );
        }
    }

    #[test]
    fn test_queries_without_ground_truth_are_skipped() {
        let engine = engine();
        let mut ground_truth = GroundTruth::new();
        ground_truth.insert("q1".to_string(), gt_entry(&["a"]));
        // q2 absent, q3 present but empty.
        ground_truth.insert("q3".to_string(), gt_entry(&[]));

        let results = vec![
            result("q1", &["a"]),
            result("q2", &["b"]),
            result("q3", &["c"]),
        ];

        let eval = engine.evaluate_retrieval(&results, &ground_truth, 5);
        assert_eq!(eval.summary.scored_queries, 1);
        assert_eq!(eval.summary.skipped_queries, 2);
    }

    #[test]
    fn test_no_usable_queries_is_not_an_error() {
        let engine = engine();
        let eval = engine.evaluate_retrieval(&[result("q1", &["a"])], &GroundTruth::new(), 5);
        assert_eq!(eval.summary.scored_queries, 0);
        assert!(eval.summary.mean.is_empty());
    }

    fn answer(query_id: &str, answer: &str, context: &[&str]) -> AnswerRecord {
        AnswerRecord {
            query_id: query_id.to_string(),
            query: "what is it".to_string(),
            answer: answer.to_string(),
            context: context.iter().map(|s| s.to_string()).collect(),
            reference_answer: None,
        }
    }

    #[tokio::test]
    async fn test_answer_metrics_ranges() {
        let engine = engine();
        let record = answer("q1", "the sky is blue", &["the sky is blue", "extra context"]);
        let metrics = engine.evaluate_answer(&record).await.unwrap();

        let faithfulness = metrics["faithfulness"];
        let hallucination = metrics["hallucination"];
        assert!((0.0..=1.0).contains(&faithfulness));
        assert!((0.0..=1.0).contains(&hallucination));
        assert!((faithfulness + hallucination - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_faithful_answer_scores_high() {
        let engine = engine();
        let record = answer("q1", "rust is memory safe", &["rust is memory safe"]);
        let metrics = engine.evaluate_answer(&record).await.unwrap();
        assert!(metrics["faithfulness"] > 0.9);
        assert!(metrics["hallucination"] < 0.1);
    }

    #[tokio::test]
    async fn test_empty_context_skipped_not_error() {
        let engine = engine();
        let records = vec![
            answer("ok", "an answer", &["some context"]),
            answer("empty", "an answer", &[]),
        ];
        let (per_query, summary) = engine.evaluate_answers(&records).await;
        assert_eq!(per_query.len(), 1);
        assert_eq!(summary.scored_queries, 1);
        assert_eq!(summary.skipped_queries, 1);
    }

    /// Provider that drops one vector from every batch response.
    struct ShortBatchEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortBatchEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_short_embedding_response_is_an_error_not_a_panic() {
        let engine = MetricsEngine::new(Arc::new(ShortBatchEmbedder));
        let record = answer("q1", "an answer", &["some context"]);

        let result = engine.evaluate_answer(&record).await;
        assert!(matches!(
            result,
            Err(crate::error::RagError::CapabilityUnavailable(_))
        ));

        // The batch path counts it as skipped instead of aborting.
        let (per_query, summary) = engine.evaluate_answers(&[record]).await;
        assert!(per_query.is_empty());
        assert_eq!(summary.skipped_queries, 1);
    }

    struct FixedReferenceScorer;

    #[async_trait]
    impl ReferenceScorer for FixedReferenceScorer {
        async fn score_reference(
            &self,
            _reference: &str,
            _candidate: &str,
        ) -> Result<ReferenceScores> {
            Ok(ReferenceScores {
                bleu: 0.4,
                rouge_l: 0.5,
                semantic: 0.9,
            })
        }
    }

    #[tokio::test]
    async fn test_reference_metrics_present_when_scorer_available() {
        let engine = MetricsEngine::with_reference_scorer(
            Arc::new(HashEmbedder::new(16)),
            Arc::new(FixedReferenceScorer),
        );
        let mut record = answer("q1", "generated answer", &["context"]);
        record.reference_answer = Some("reference answer".to_string());

        let metrics = engine.evaluate_answer(&record).await.unwrap();
        assert_eq!(metrics["bleu"], 0.4);
        assert_eq!(metrics["rouge_l"], 0.5);
        assert_eq!(metrics["semantic_similarity"], 0.9);
    }

    #[tokio::test]
    async fn test_reference_metrics_absent_without_scorer() {
        let engine = engine();
        let mut record = answer("q1", "generated answer", &["context"]);
        record.reference_answer = Some("reference answer".to_string());

        let metrics = engine.evaluate_answer(&record).await.unwrap();
        assert!(!metrics.contains_key("bleu"));
        assert!(!metrics.contains_key("rouge_l"));
    }
}

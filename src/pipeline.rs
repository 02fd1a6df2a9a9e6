//! End-to-end run orchestration.
//!
//! One run processes a corpus and a query set synchronously, one query at a
//! time: segment -> embed -> index -> retrieve -> ground truth -> metrics.
//! Per-query failures are caught at the query boundary and counted as
//! skipped; a fatal embedding failure flushes the artifacts accumulated so
//! far before the run aborts, so already-processed queries stay valid.

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::ground_truth::GroundTruthBuilder;
use crate::index::{RetrievalResult, VectorIndex};
use crate::metrics::{AnswerRecord, EvaluationSummary, MetricRecord, MetricsEngine, RetrievalEvaluation};
use crate::persistence::{
    self, ANSWER_METRICS_FILENAME, GROUND_TRUTH_FILENAME, METRICS_FILENAME, RETRIEVAL_FILENAME,
    RetrievalResults, UNITS_FILENAME,
};
use crate::provider::{EmbeddingProvider, RelevanceScorer};
use crate::ranking::RankingPolicy;
use crate::segmenter::{Segmenter, Strategy};
use crate::unit::{Embedding, Query, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Batch size for embedding calls.
const EMBED_BATCH_SIZE: usize = 32;

/// Summary of one completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Directory holding this run's artifacts.
    pub run_dir: PathBuf,
    /// Units produced by segmentation.
    pub total_units: usize,
    /// Queries processed.
    pub total_queries: usize,
    /// Queries that contributed to the aggregate metrics.
    pub scored_queries: usize,
    /// Queries skipped (no candidates or no usable ground truth).
    pub skipped_queries: usize,
    /// Mean metric values across scored queries.
    pub mean_metrics: MetricRecord,
    /// Total run time in seconds.
    pub total_time_secs: f64,
}

impl RunSummary {
    /// Print summary to stdout.
    pub fn print_summary(&self) {
        println!("\n========== Run Summary ==========");
        println!("Run dir:       {}", self.run_dir.display());
        println!("Units:         {}", self.total_units);
        println!("Queries:       {}", self.total_queries);
        println!("Scored:        {}", self.scored_queries);
        println!("Skipped:       {}", self.skipped_queries);
        println!("---------------------------------");
        for (name, value) in &self.mean_metrics {
            println!("{:<14} {:.4}", name, value);
        }
        println!("---------------------------------");
        println!("Total time:    {:.1}s", self.total_time_secs);
        println!("=================================\n");
    }
}

/// Persisted shape of the answer-metrics artifact, mirroring the retrieval
/// metrics file.
#[derive(Debug, Serialize, Deserialize)]
struct AnswerEvaluation {
    per_query: BTreeMap<String, MetricRecord>,
    summary: EvaluationSummary,
}

/// Orchestrates segmentation, retrieval, ground truth, and evaluation.
pub struct Pipeline {
    segmenter: Segmenter,
    embedder: Arc<dyn EmbeddingProvider>,
    ground_truth_builder: GroundTruthBuilder,
    metrics: MetricsEngine,
    top_k: usize,
}

impl Pipeline {
    /// Build a pipeline from configuration and capabilities. The relevance
    /// scorer is optional; without it ranking falls back to cosine
    /// similarity.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        scorer: Option<Arc<dyn RelevanceScorer>>,
    ) -> Self {
        let policy = match scorer {
            Some(scorer) => RankingPolicy::with_scorer(embedder.clone(), scorer),
            None => RankingPolicy::new(embedder.clone()),
        };

        Self {
            segmenter: Segmenter::new(config.chunking.clone(), embedder.clone()),
            ground_truth_builder: GroundTruthBuilder::new(policy, config.retrieval.relevant_top_n),
            metrics: MetricsEngine::new(embedder.clone()),
            embedder,
            top_k: config.retrieval.top_k,
        }
    }

    /// Segment every document in the corpus, preserving source order.
    pub async fn segment_corpus(
        &self,
        documents: &[(String, String)],
        strategy: Strategy,
    ) -> Result<Vec<Unit>> {
        let mut units = Vec::new();
        for (name, text) in documents {
            units.extend(self.segmenter.segment(text, strategy, name).await?);
        }
        Ok(units)
    }

    /// Embed units in batches and build the similarity index.
    async fn build_index(&self, units: &[Unit]) -> Result<VectorIndex> {
        let mut entries = Vec::with_capacity(units.len());

        for batch in units.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|u| u.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            for (unit, vector) in batch.iter().zip(vectors) {
                entries.push(Embedding::new(&unit.unit_id, &unit.text, vector));
            }
        }

        VectorIndex::build(entries)
    }

    /// Run the full pipeline and persist artifacts under `output_root`.
    pub async fn run(
        &self,
        documents: &[(String, String)],
        queries: &[Query],
        strategy: Strategy,
        output_root: &Path,
    ) -> Result<RunSummary> {
        let start_time = Instant::now();

        let units = self.segment_corpus(documents, strategy).await?;
        if units.is_empty() {
            return Err(RagError::NoUnits);
        }
        info!(units = units.len(), "corpus segmented");

        let index = self.build_index(&units).await?;

        let run_dir = persistence::create_run_dir(output_root)?;
        persistence::save_units(&units, &run_dir.join(UNITS_FILENAME))?;

        // One query end-to-end at a time. An embedding failure is fatal for
        // the run, but results for already-processed queries are flushed
        // first.
        let mut results: Vec<RetrievalResult> = Vec::new();
        for query in queries {
            let query_vector = match self.embedder.embed_one(&query.text).await {
                Ok(vector) => vector,
                Err(err) => {
                    warn!(query_id = %query.query_id, "embedding failed, flushing partial results");
                    self.flush_retrieval(&results, &run_dir)?;
                    return Err(err);
                }
            };

            match index.search(&query_vector, self.top_k) {
                Ok(retrieved) => results.push(RetrievalResult {
                    query_id: query.query_id.clone(),
                    query: query.text.clone(),
                    retrieved,
                }),
                Err(err) => {
                    warn!(query_id = %query.query_id, %err, "search failed, skipping query");
                }
            }
        }

        self.flush_retrieval(&results, &run_dir)?;

        let ground_truth = self.ground_truth_builder.build(&results).await?;
        persistence::save_ground_truth(&ground_truth, &run_dir.join(GROUND_TRUTH_FILENAME))?;

        let evaluation = self
            .metrics
            .evaluate_retrieval(&results, &ground_truth, self.top_k);
        persistence::save_artifact(&evaluation, &run_dir.join(METRICS_FILENAME))?;

        Ok(RunSummary {
            run_dir,
            total_units: units.len(),
            total_queries: queries.len(),
            scored_queries: evaluation.summary.scored_queries,
            skipped_queries: evaluation.summary.skipped_queries,
            mean_metrics: evaluation.summary.mean,
            total_time_secs: start_time.elapsed().as_secs_f64(),
        })
    }

    fn flush_retrieval(&self, results: &[RetrievalResult], run_dir: &Path) -> Result<()> {
        let keyed: RetrievalResults = results
            .iter()
            .map(|r| (r.query_id.clone(), r.clone()))
            .collect();
        persistence::save_retrieval_results(&keyed, &run_dir.join(RETRIEVAL_FILENAME))
    }

    /// Re-evaluate a persisted run's retrieval quality at cutoff `k`.
    pub fn evaluate_run(&self, run_dir: &Path, k: usize) -> Result<RetrievalEvaluation> {
        if k == 0 {
            return Err(RagError::Config("evaluation k must be at least 1".to_string()));
        }

        let results = persistence::load_retrieval_results(&run_dir.join(RETRIEVAL_FILENAME))?;
        let ground_truth = persistence::load_ground_truth(&run_dir.join(GROUND_TRUTH_FILENAME))?;

        let results: Vec<RetrievalResult> = results.into_values().collect();
        let evaluation = self.metrics.evaluate_retrieval(&results, &ground_truth, k);
        persistence::save_artifact(&evaluation, &run_dir.join(METRICS_FILENAME))?;
        Ok(evaluation)
    }

    /// Evaluate generated answers stored in a run directory
    /// (`answers/answers.json`, keyed by query id). Returns `None` when the
    /// run has no answers artifact.
    pub async fn evaluate_run_answers(
        &self,
        run_dir: &Path,
    ) -> Result<Option<EvaluationSummary>> {
        let answers_path = run_dir.join("answers/answers.json");
        if !answers_path.exists() {
            return Ok(None);
        }

        let answers: BTreeMap<String, AnswerRecord> = persistence::load_artifact(&answers_path)?;
        let records: Vec<AnswerRecord> = answers.into_values().collect();

        let (per_query, summary) = self.metrics.evaluate_answers(&records).await;
        let artifact = AnswerEvaluation {
            per_query,
            summary: summary.clone(),
        };
        persistence::save_artifact(&artifact, &run_dir.join(ANSWER_METRICS_FILENAME))?;
        Ok(Some(summary))
    }
}

/// Load a corpus of text documents (`.txt`, `.md`) from a directory,
/// sorted by path for deterministic order.
pub fn load_corpus(dir: &Path) -> Result<Vec<(String, String)>> {
    if !dir.is_dir() {
        return Err(RagError::EmptyCorpus(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(&path).map_err(|e| RagError::io(&path, e))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();
        documents.push((name, text));
    }

    if documents.is_empty() {
        return Err(RagError::EmptyCorpus(dir.to_path_buf()));
    }

    Ok(documents)
}

/// Load queries from a JSON file: a list of `{query_id, text}` records.
pub fn load_queries(path: &Path) -> Result<Vec<Query>> {
    persistence::load_artifact(path)
}

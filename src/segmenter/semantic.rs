//! Semantic segmentation: cut where adjacent sentences stop cohering.
//!
//! Adjacent-sentence cosine distances are compared against a percentile of
//! their own distribution, so the breakpoint threshold adapts per document
//! instead of relying on an absolute distance cutoff.

use super::{percentile, sentence_tokenize};
use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, cosine_similarity};
use crate::unit::Unit;

/// A run of consecutive sentences forming one prospective unit.
pub(super) struct SentenceRun {
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
    pub num_sentences: usize,
}

pub(super) async fn segment(
    text: &str,
    document: &str,
    config: &ChunkingConfig,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<Unit>> {
    let runs = split_runs(text, config, embedder).await?;
    Ok(runs
        .into_iter()
        .enumerate()
        .map(|(idx, run)| {
            Unit::new(
                document,
                "semantic",
                idx,
                run.text,
                run.start_index,
                run.end_index,
                run.num_sentences,
            )
        })
        .collect())
}

/// Core semantic split, shared with the hybrid strategy.
///
/// Runs shorter than `min_chunk_size` sentences are merged forward into the
/// following run; the trailing run is always emitted regardless of size.
pub(super) async fn split_runs(
    text: &str,
    config: &ChunkingConfig,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<SentenceRun>> {
    let sentences = sentence_tokenize(text);

    if sentences.is_empty() {
        return Ok(Vec::new());
    }

    // Too few sentences to subdivide: the whole text is one unit.
    if sentences.len() <= config.min_chunk_size {
        return Ok(vec![SentenceRun {
            text: text.trim().to_string(),
            start_index: 0,
            end_index: sentences.len(),
            num_sentences: sentences.len(),
        }]);
    }

    let embeddings = embedder.embed(&sentences).await?;

    let distances: Vec<f32> = embeddings
        .windows(2)
        .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
        .collect();

    let threshold = percentile(&distances, config.percentile_threshold);

    let mut runs = Vec::new();
    let mut start = 0;
    for (i, &distance) in distances.iter().enumerate() {
        if distance <= threshold {
            continue;
        }
        // Candidate cut after sentence i. A run below min_chunk_size is not
        // cut here; it merges forward into the next run.
        let run_len = i + 1 - start;
        if run_len >= config.min_chunk_size {
            runs.push(make_run(&sentences, start, i + 1));
            start = i + 1;
        }
    }

    if start < sentences.len() {
        runs.push(make_run(&sentences, start, sentences.len()));
    }

    Ok(runs)
}

fn make_run(sentences: &[String], start: usize, end: usize) -> SentenceRun {
    SentenceRun {
        text: sentences[start..end].join(" "),
        start_index: start,
        end_index: end,
        num_sentences: end - start,
    }
}

//! Document segmentation: splitting raw text into retrievable units.
//!
//! Four interchangeable strategies plus an automatic selector:
//! - **Structural**: blank-line / heading boundaries
//! - **Sliding**: fixed-size character windows with overlap
//! - **Semantic**: percentile-adaptive cuts at coherence boundaries
//! - **Hybrid**: structural sections, semantically split within each
//!
//! Strategy dispatch is an enum, not a trait hierarchy; the semantic and
//! hybrid strategies call through the [`EmbeddingProvider`] seam.

mod hybrid;
mod semantic;
mod sliding;
mod structural;

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::provider::EmbeddingProvider;
use crate::unit::Unit;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Segmentation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Split on blank lines and markup headings.
    Structural,
    /// Fixed-size character windows with overlap.
    Sliding,
    /// Percentile-adaptive sentence grouping.
    Semantic,
    /// Structural first, then semantic within each section.
    Hybrid,
    /// Pick a strategy from text shape (coherence-variance heuristic).
    Auto,
}

impl Strategy {
    /// Strategy name as recorded in unit metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Structural => "structural",
            Strategy::Sliding => "sliding",
            Strategy::Semantic => "semantic",
            Strategy::Hybrid => "hybrid",
            Strategy::Auto => "auto",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "structural" => Ok(Strategy::Structural),
            "sliding" => Ok(Strategy::Sliding),
            "semantic" => Ok(Strategy::Semantic),
            "hybrid" => Ok(Strategy::Hybrid),
            "auto" => Ok(Strategy::Auto),
            other => Err(RagError::Config(format!(
                "Unknown chunking strategy: {}",
                other
            ))),
        }
    }
}

/// Splits documents into ordered [`Unit`]s under a selected strategy.
pub struct Segmenter {
    config: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Segmenter {
    /// Create a segmenter with explicit chunking parameters.
    pub fn new(config: ChunkingConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { config, embedder }
    }

    /// Split `text` into ordered units. Empty input yields an empty Vec.
    pub async fn segment(
        &self,
        text: &str,
        strategy: Strategy,
        document: &str,
    ) -> Result<Vec<Unit>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let units = match strategy {
            Strategy::Structural => structural::segment(text, document),
            Strategy::Sliding => sliding::segment(text, document, &self.config)?,
            Strategy::Semantic => {
                semantic::segment(text, document, &self.config, self.embedder.as_ref()).await?
            }
            Strategy::Hybrid => {
                hybrid::segment(text, document, &self.config, self.embedder.as_ref()).await?
            }
            Strategy::Auto => {
                let chosen = self.auto_select(text).await?;
                debug!(strategy = chosen.name(), "auto-selected chunking strategy");
                return Box::pin(self.segment(text, chosen, document)).await;
            }
        };

        debug!(
            document,
            strategy = strategy.name(),
            units = units.len(),
            "segmented document"
        );
        Ok(units)
    }

    /// Classify text as structured, narrative, or mixed and pick a strategy.
    ///
    /// Short lines with low embedding variance read as structured documents;
    /// high variance or long sentences read as narrative prose. Thresholds
    /// come from [`ChunkingConfig`] and are heuristic defaults, not tuned
    /// invariants.
    async fn auto_select(&self, text: &str) -> Result<Strategy> {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let sentences = sentence_tokenize(text);

        let avg_line_length = if lines.is_empty() {
            0.0
        } else {
            lines.iter().map(|l| l.len() as f64).sum::<f64>() / lines.len() as f64
        };
        let avg_sentence_length = if sentences.is_empty() {
            0.0
        } else {
            sentences
                .iter()
                .map(|s| s.split_whitespace().count() as f64)
                .sum::<f64>()
                / sentences.len() as f64
        };

        let sample: Vec<String> = sentences.into_iter().take(10).collect();
        let coherence_score = if sample.is_empty() {
            0.0
        } else {
            let embeddings = self.embedder.embed(&sample).await?;
            mean_dimension_variance(&embeddings)
        };

        if avg_line_length < self.config.structured_line_len
            && coherence_score < self.config.low_coherence
        {
            Ok(Strategy::Structural)
        } else if coherence_score > self.config.high_coherence || avg_sentence_length > 18.0 {
            Ok(Strategy::Semantic)
        } else {
            Ok(Strategy::Hybrid)
        }
    }
}

/// Mean per-dimension variance across a set of embeddings.
fn mean_dimension_variance(embeddings: &[Vec<f32>]) -> f64 {
    if embeddings.is_empty() || embeddings[0].is_empty() {
        return 0.0;
    }
    let n = embeddings.len() as f64;
    let dim = embeddings[0].len();
    let mut total = 0.0;
    for d in 0..dim {
        let mean: f64 = embeddings.iter().map(|e| e[d] as f64).sum::<f64>() / n;
        let var: f64 = embeddings
            .iter()
            .map(|e| {
                let diff = e[d] as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        total += var;
    }
    total / dim as f64
}

/// Rule-based sentence tokenizer: a sentence ends at `.`, `!`, or `?`
/// followed by whitespace (or end of input). Trimmed, empty sentences
/// dropped.
pub(crate) fn sentence_tokenize(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_end = i + 1 >= chars.len();
            let before_space = chars.get(i + 1).is_some_and(|n| n.is_whitespace());
            if at_end || before_space {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }

    let trailing = current.trim();
    if !trailing.is_empty() {
        sentences.push(trailing.to_string());
    }

    sentences
}

/// Percentile with linear interpolation between order statistics.
pub(crate) fn percentile(values: &[f32], p: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = (rank - lo as f64) as f32;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::HashEmbedder;
    use super::*;
    use crate::config::ChunkingConfig;

    fn segmenter() -> Segmenter {
        Segmenter::new(ChunkingConfig::default(), Arc::new(HashEmbedder::new(16)))
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(Strategy::from_str("Semantic").unwrap(), Strategy::Semantic);
        assert_eq!(Strategy::from_str("SLIDING").unwrap(), Strategy::Sliding);
        assert!(matches!(
            Strategy::from_str("recursive"),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_sentence_tokenize() {
        let sentences = sentence_tokenize("First one. Second here! Third? Trailing bit");
        assert_eq!(
            sentences,
            vec!["First one.", "Second here!", "Third?", "Trailing bit"]
        );
    }

    #[test]
    fn test_sentence_tokenize_does_not_split_decimals() {
        let sentences = sentence_tokenize("Pi is 3.14 roughly. Next sentence.");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "Pi is 3.14 roughly.");
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        // numpy.percentile([1,2,3,4], 50) == 2.5
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-6);
        assert!((percentile(&values, 0.0) - 1.0).abs() < 1e-6);
        assert!((percentile(&values, 100.0) - 4.0).abs() < 1e-6);
        // rank = 0.85 * 3 = 2.55 -> 3 + 0.55
        assert!((percentile(&values, 85.0) - 3.55).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_input_is_not_an_error() {
        let seg = segmenter();
        for strategy in [
            Strategy::Structural,
            Strategy::Sliding,
            Strategy::Semantic,
            Strategy::Hybrid,
        ] {
            let units = seg.segment("", strategy, "doc").await.unwrap();
            assert!(units.is_empty(), "{} produced units for empty input", strategy);
        }
    }

    #[tokio::test]
    async fn test_auto_select_structured() {
        let seg = segmenter();
        // Short identical lines: low variance, short lines.
        let text = "alpha beta\nalpha beta\nalpha beta\nalpha beta\n";
        let chosen = seg.auto_select(text).await.unwrap();
        assert_eq!(chosen, Strategy::Structural);
    }

    #[tokio::test]
    async fn test_auto_strategy_produces_units() {
        let seg = segmenter();
        let units = seg
            .segment("alpha beta\n\ngamma delta", Strategy::Auto, "doc")
            .await
            .unwrap();
        assert!(!units.is_empty());
    }
}

//! Core data records: retrievable units, queries, and embeddings.
//!
//! A [`Unit`] is one indivisible retrievable span of text produced by the
//! segmenter. Units are immutable once created; every later stage consumes
//! them by value or by reference, never by shared mutation.

use serde::{Deserialize, Serialize};

/// Positional metadata attached to a [`Unit`] by the segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceMetadata {
    /// Name of the segmentation strategy that produced this unit.
    pub strategy: String,
    /// Start offset within the source (characters for sliding windows,
    /// section/sentence index for the other strategies).
    pub start_index: usize,
    /// End offset within the source (exclusive).
    pub end_index: usize,
    /// Number of sentences in the unit, where the strategy tracks them.
    #[serde(default)]
    pub num_sentences: usize,
    /// Number of whitespace-separated words in the unit.
    pub num_words: usize,
}

/// One retrievable span of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier, stable within a document:
    /// `{document}_{strategy}_{n}`.
    pub unit_id: String,
    /// The text content. Non-empty by construction.
    pub text: String,
    /// Identifier of the source document.
    pub source_document: String,
    /// Strategy name and offsets.
    pub sequence_metadata: SequenceMetadata,
}

impl Unit {
    /// Create a new unit with an id derived from document, strategy, and
    /// sequence number.
    pub fn new(
        document: &str,
        strategy: &str,
        sequence: usize,
        text: impl Into<String>,
        start_index: usize,
        end_index: usize,
        num_sentences: usize,
    ) -> Self {
        let text = text.into();
        let num_words = count_words(&text);
        Self {
            unit_id: format!("{}_{}_{}", document, strategy, sequence),
            text,
            source_document: document.to_string(),
            sequence_metadata: SequenceMetadata {
                strategy: strategy.to_string(),
                start_index,
                end_index,
                num_sentences,
                num_words,
            },
        }
    }
}

/// A query to evaluate retrieval against. Ephemeral: produced per run,
/// persisted only as part of run artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Unique identifier within a run.
    pub query_id: String,
    /// Query text.
    pub text: String,
}

impl Query {
    pub fn new(query_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            text: text.into(),
        }
    }
}

/// A fixed-length vector embedding associated 1:1 with a unit.
///
/// All embeddings indexed together must share the same dimensionality;
/// [`crate::index::VectorIndex::build`] rejects violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Id of the unit this vector represents.
    pub unit_id: String,
    /// Text of the unit, carried alongside so retrieval results can report it.
    pub text: String,
    /// The embedding vector.
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(unit_id: impl Into<String>, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            unit_id: unit_id.into(),
            text: text.into(),
            vector,
        }
    }
}

/// Count whitespace-separated words.
pub(crate) fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

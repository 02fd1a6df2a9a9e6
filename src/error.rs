//! Error types for the retrieval-and-evaluation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur in the engine.
#[derive(Error, Debug)]
pub enum RagError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration: bad strategy name, bad window/overlap
    /// combination, k <= 0 where required. Fatal, never retried.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The corpus directory does not exist or holds no documents.
    #[error("Corpus path '{0}' does not exist or contains no documents")]
    EmptyCorpus(PathBuf),

    /// Segmentation produced zero units across the whole corpus.
    #[error("Segmentation produced no units; nothing to index")]
    NoUnits,

    /// A vector index was built from zero vectors.
    #[error("Vector index is empty: {0}")]
    EmptyIndex(String),

    /// Vector dimensionality disagrees with the rest of the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An external capability (embedding, relevance scoring) failed to
    /// initialize or answer a call. Recoverable for scoring (the ranking
    /// policy falls back to cosine similarity); fatal for embedding.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A run directory or one of its artifacts is missing.
    #[error("Run artifact not found at '{0}'")]
    RunNotFound(PathBuf),
}

impl RagError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}

//! External capability seams.
//!
//! The engine consumes three capabilities, each behind a trait so tests and
//! callers can substitute implementations:
//! - [`EmbeddingProvider`]: text -> fixed-length vectors
//! - [`RelevanceScorer`]: pairwise (query, candidate) relevance
//! - [`ReferenceScorer`]: answer-vs-reference NLP metrics (BLEU, ROUGE-L,
//!   learned semantic similarity)
//!
//! HTTP-backed implementations for the first two are provided against
//! OpenAI-compatible endpoints.

pub mod embedding;
pub mod scorer;

pub use embedding::{EmbeddingProvider, RemoteEmbedder, cosine_similarity, l2_normalize};
pub use scorer::{ReferenceScorer, ReferenceScores, RelevanceScorer, RemoteScorer};

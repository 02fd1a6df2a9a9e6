//! Marco RAG - a retrieval-and-evaluation engine for RAG experiments.
//!
//! This library segments text corpora into retrieval units, indexes them as
//! embedding vectors, retrieves candidates per query by cosine similarity,
//! derives per-query ground truth with a two-stage ranking policy, and
//! scores both retrieval quality and generated-answer quality.
//!
//! # Quick Start
//!
//! ```no_run
//! use marco_rag::{
//!     config::Config,
//!     pipeline::{load_corpus, load_queries, Pipeline},
//!     provider::RemoteEmbedder,
//!     segmenter::Strategy,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     // Load the corpus and the query set
//!     let documents = load_corpus(Path::new("corpus"))?;
//!     let queries = load_queries(Path::new("queries.json"))?;
//!
//!     // Run the full pipeline
//!     let embedder = Arc::new(RemoteEmbedder::new(config.embedding.clone()));
//!     let pipeline = Pipeline::new(&config, embedder, None);
//!     let summary = pipeline
//!         .run(&documents, &queries, Strategy::Auto, Path::new("runs"))
//!         .await?;
//!
//!     summary.print_summary();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Segmenter**: splits documents into units (structural, sliding,
//!   semantic, hybrid, or auto-selected)
//! - **VectorIndex**: in-memory cosine-similarity index over unit embeddings
//! - **RankingPolicy**: pairwise relevance scoring with cosine fallback
//! - **GroundTruthBuilder**: derives relevant-unit labels per query
//! - **MetricsEngine**: rank-quality and answer-quality metrics
//! - **Pipeline**: orchestrates one run and persists its artifacts

pub mod config;
pub mod error;
pub mod ground_truth;
pub mod index;
pub mod metrics;
pub mod persistence;
pub mod pipeline;
pub mod provider;
pub mod ranking;
pub mod segmenter;
pub mod unit;

// Re-export commonly used types
pub use config::Config;
pub use error::{RagError, Result};
pub use ground_truth::{GroundTruth, GroundTruthBuilder};
pub use index::{RetrievalResult, RetrievedUnit, VectorIndex};
pub use metrics::{MetricsEngine, RetrievalEvaluation};
pub use pipeline::{Pipeline, RunSummary};
pub use provider::{EmbeddingProvider, RemoteEmbedder, RemoteScorer};
pub use ranking::RankingPolicy;
pub use segmenter::{Segmenter, Strategy};
pub use unit::{Query, Unit};

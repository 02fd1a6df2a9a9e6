//! Configuration for the retrieval-and-evaluation engine.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Embedding capability configuration (OpenAI-compatible `/v1/embeddings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL for the embedding API (e.g., "https://api.openai.com")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Embedding model name
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "all-minilm-l6-v2".to_string(),
        }
    }
}

/// Pairwise relevance scorer configuration. Optional: when the endpoint is
/// absent the ranking policy falls back to cosine similarity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Base URL for the scoring API; empty means "no scorer configured".
    #[serde(default)]
    pub api_base: String,

    /// API key for authentication
    #[serde(default)]
    pub api_key: String,

    /// Scoring model name
    #[serde(default)]
    pub model: String,
}

impl ScorerConfig {
    /// Whether a scorer endpoint has been configured at all.
    pub fn is_configured(&self) -> bool {
        !self.api_base.is_empty()
    }
}

/// Segmentation parameters shared by the chunking strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Sliding window size in characters.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Characters shared between consecutive sliding windows.
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Percentile of adjacent-sentence distances used as the semantic
    /// breakpoint threshold.
    #[serde(default = "default_percentile")]
    pub percentile_threshold: f64,

    /// Minimum sentences per semantic unit; shorter runs merge forward.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Auto-selection: average line length below which text counts as
    /// structured.
    #[serde(default = "default_structured_line_len")]
    pub structured_line_len: f64,

    /// Auto-selection: embedding variance below which text counts as
    /// low-coherence (structured).
    #[serde(default = "default_low_coherence")]
    pub low_coherence: f64,

    /// Auto-selection: embedding variance above which text counts as
    /// narrative.
    #[serde(default = "default_high_coherence")]
    pub high_coherence: f64,
}

fn default_window_size() -> usize {
    800
}

fn default_overlap() -> usize {
    100
}

fn default_percentile() -> f64 {
    85.0
}

fn default_min_chunk_size() -> usize {
    3
}

fn default_structured_line_len() -> f64 {
    80.0
}

fn default_low_coherence() -> f64 {
    0.15
}

fn default_high_coherence() -> f64 {
    0.30
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            overlap: default_overlap(),
            percentile_threshold: default_percentile(),
            min_chunk_size: default_min_chunk_size(),
            structured_line_len: default_structured_line_len(),
            low_coherence: default_low_coherence(),
            high_coherence: default_high_coherence(),
        }
    }
}

/// Retrieval and ground-truth parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of results returned per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// How many top-ranked units count as "relevant" in the ground truth.
    #[serde(default = "default_relevant_top_n")]
    pub relevant_top_n: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_relevant_top_n() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            relevant_top_n: default_relevant_top_n(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Embedding capability settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Optional pairwise relevance scorer settings.
    #[serde(default)]
    pub scorer: ScorerConfig,
    /// Segmentation settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (EMBEDDING_API_BASE, EMBEDDING_API_KEY, ...)
    /// 2. Config file (~/.config/marco-rag/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        if let Ok(api_base) = env::var("EMBEDDING_API_BASE") {
            config.embedding.api_base = api_base;
        }
        if let Ok(api_key) = env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = api_key;
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }

        if let Ok(api_base) = env::var("SCORER_API_BASE") {
            config.scorer.api_base = api_base;
        }
        if let Ok(api_key) = env::var("SCORER_API_KEY") {
            config.scorer.api_key = api_key;
        }
        if let Ok(model) = env::var("SCORER_MODEL") {
            config.scorer.model = model;
        }

        if let Ok(top_k) = env::var("RETRIEVAL_TOP_K") {
            if let Ok(k) = top_k.parse() {
                config.retrieval.top_k = k;
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "marco-rag")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present and consistent.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.api_base.is_empty() {
            return Err(RagError::Config(
                "Embedding API base URL is required. Set EMBEDDING_API_BASE or add to config file."
                    .to_string(),
            ));
        }

        if self.embedding.model.is_empty() {
            return Err(RagError::Config(
                "Embedding model is required. Set EMBEDDING_MODEL or add to config file."
                    .to_string(),
            ));
        }

        if self.chunking.overlap >= self.chunking.window_size {
            return Err(RagError::Config(format!(
                "Sliding window overlap ({}) must be smaller than window size ({})",
                self.chunking.overlap, self.chunking.window_size
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }

        if self.retrieval.relevant_top_n == 0 {
            return Err(RagError::Config(
                "relevant_top_n must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a config with explicit embedding endpoint values (useful for
    /// testing).
    pub fn with_embedding(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            embedding: EmbeddingConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.embedding.api_base.is_empty());
        assert_eq!(config.chunking.window_size, 800);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.chunking.percentile_threshold, 85.0);
        assert_eq!(config.chunking.min_chunk_size, 3);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.relevant_top_n, 5);
        assert!(!config.scorer.is_configured());
    }

    #[test]
    fn test_validate_fails_without_embedding_endpoint() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        let mut config = Config::with_embedding("https://api.example.com", "key", "model");
        config.chunking.window_size = 100;
        config.chunking.overlap = 100;
        assert!(config.validate().is_err());

        config.chunking.overlap = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = Config::with_embedding("https://api.example.com", "key", "model");
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "embedding:\n  api_base: https://api.example.com\n  api_key: k\n  model: minilm\nretrieval:\n  top_k: 7\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.embedding.api_base, "https://api.example.com");
        assert_eq!(config.retrieval.top_k, 7);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.chunking.window_size, 800);
    }

    #[test]
    fn test_with_embedding() {
        let config = Config::with_embedding("https://api.example.com", "test-key", "minilm");
        assert_eq!(config.embedding.api_base, "https://api.example.com");
        assert_eq!(config.embedding.api_key, "test-key");
        assert_eq!(config.embedding.model, "minilm");
    }
}

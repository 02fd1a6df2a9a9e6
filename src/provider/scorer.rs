//! Relevance and reference scoring capabilities.

use crate::config::ScorerConfig;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Scores the relevance of a candidate text to a query.
///
/// This capability is optional: when it is unavailable the ranking policy
/// falls back to embedding cosine similarity.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Score one (query, candidate) pair. Higher means more relevant.
    async fn score(&self, query: &str, candidate: &str) -> Result<f32>;
}

/// Scores a generated answer against a reference answer.
///
/// The engine orchestrates these metrics but does not reimplement them;
/// BLEU, ROUGE-L, and learned semantic similarity come from whatever NLP
/// stack backs the implementation.
#[async_trait]
pub trait ReferenceScorer: Send + Sync {
    /// Score a candidate answer against a reference answer.
    async fn score_reference(&self, reference: &str, candidate: &str) -> Result<ReferenceScores>;
}

/// Answer-vs-reference scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceScores {
    /// N-gram precision with brevity penalty.
    pub bleu: f64,
    /// Longest-common-subsequence F-measure.
    pub rouge_l: f64,
    /// Learned semantic-similarity score.
    pub semantic: f64,
}

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Pairwise relevance scorer backed by an OpenAI-compatible chat endpoint.
///
/// Plays the role the original system gave a cross-encoder reranker: every
/// (query, candidate) pair gets an absolute relevance score.
#[derive(Clone)]
pub struct RemoteScorer {
    client: Client,
    config: ScorerConfig,
}

impl RemoteScorer {
    /// Create a scorer from config. Returns an error when no endpoint is
    /// configured, so callers can probe availability at construction time.
    pub fn new(config: ScorerConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(RagError::CapabilityUnavailable(
                "no relevance scorer endpoint configured".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }

    /// Parse a bare float out of the model response.
    fn parse_score(content: &str) -> Result<f32> {
        content
            .trim()
            .trim_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
            .parse::<f32>()
            .map_err(|_| {
                RagError::CapabilityUnavailable(format!(
                    "scorer returned non-numeric response: {}",
                    content.trim()
                ))
            })
    }
}

#[async_trait]
impl RelevanceScorer for RemoteScorer {
    async fn score(&self, query: &str, candidate: &str) -> Result<f32> {
        let prompt = format!(
            "Rate how relevant the passage is to the query on a scale from 0.0 \
             (unrelated) to 1.0 (directly answers it).\n\nQuery: {}\n\nPassage:\n{}\n\n\
             Respond with only the number.",
            query, candidate
        );

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RagError::CapabilityUnavailable(format!(
                "scoring request failed ({}): {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                RagError::CapabilityUnavailable("no choices in scorer response".to_string())
            })?;

        Self::parse_score(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_scorer_is_unavailable() {
        let result = RemoteScorer::new(ScorerConfig::default());
        assert!(matches!(result, Err(RagError::CapabilityUnavailable(_))));
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(RemoteScorer::parse_score("0.75").unwrap(), 0.75);
        assert_eq!(RemoteScorer::parse_score("  0.2\n").unwrap(), 0.2);
        assert!(RemoteScorer::parse_score("no idea").is_err());
    }

    #[test]
    fn test_endpoint_construction() {
        let scorer = RemoteScorer::new(ScorerConfig {
            api_base: "https://api.example.com/".to_string(),
            api_key: "k".to_string(),
            model: "m".to_string(),
        })
        .unwrap();
        assert_eq!(scorer.endpoint(), "https://api.example.com/v1/chat/completions");
    }
}

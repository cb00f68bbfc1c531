//! Second-pass relevance scoring of a retrieved candidate pool.
//!
//! A generative model is asked to score each candidate's relevance to the
//! question, correcting ordering mistakes made by pure vector similarity.
//! Two interchangeable backends implement [`Reranker`]: a fast local model
//! via Ollama, and the same provider used for final answers. Both share one
//! prompt/response contract and one degradation policy:
//!
//! - unparseable or mis-sized response → every candidate scores the neutral
//!   0.5 ("no preference"), never an error;
//! - transport/provider failure → every candidate keeps its cosine score
//!   (re-ranking becomes a no-op), never an error.
//!
//! Re-ranking must never fail the overall query, so the trait is
//! infallible by construction.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::completion::{CompletionClient, CompletionRequest, OllamaChatClient};
use crate::config::{RagConfig, RerankBackend, RerankConfig};
use crate::error::Result;
use crate::models::{ChatMessage, EmbeddedChunk};

/// Each candidate's text is truncated to this many characters in the
/// scoring prompt, bounding prompt size and latency.
const SNIPPET_LEN: usize = 200;

/// Score assigned to every candidate when the model's answer is unusable.
const NEUTRAL_SCORE: f32 = 0.5;

/// A candidate annotated with both its first-pass and second-pass scores.
/// Transient: produced during one query, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankedCandidate {
    pub chunk: EmbeddedChunk,
    pub cosine_score: f32,
    pub llm_score: f32,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score the candidate pool against the question. Infallible:
    /// degradation is internal and only logged.
    async fn rerank(
        &self,
        question: &str,
        candidates: &[(EmbeddedChunk, f32)],
    ) -> Vec<RerankedCandidate>;
}

/// Re-ranks with a small local model served by Ollama.
pub struct LocalReranker {
    client: OllamaChatClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LocalReranker {
    pub fn new(config: &RerankConfig) -> Result<Self> {
        Ok(Self {
            client: OllamaChatClient::new(config.url.as_deref(), config.timeout_secs)?,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Reranker for LocalReranker {
    async fn rerank(
        &self,
        question: &str,
        candidates: &[(EmbeddedChunk, f32)],
    ) -> Vec<RerankedCandidate> {
        rerank_with(
            &self.client,
            &self.model,
            self.temperature,
            self.max_tokens,
            question,
            candidates,
        )
        .await
    }
}

/// Re-ranks with the completion provider that also produces final answers.
pub struct ProviderReranker {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ProviderReranker {
    pub fn new(client: Arc<dyn CompletionClient>, config: &RerankConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl Reranker for ProviderReranker {
    async fn rerank(
        &self,
        question: &str,
        candidates: &[(EmbeddedChunk, f32)],
    ) -> Vec<RerankedCandidate> {
        rerank_with(
            self.client.as_ref(),
            &self.model,
            self.temperature,
            self.max_tokens,
            question,
            candidates,
        )
        .await
    }
}

/// Build the configured re-ranker, or `None` when re-ranking is disabled.
/// `provider` is the completion client already used for final answers.
pub fn create_reranker(
    config: &RagConfig,
    provider: Arc<dyn CompletionClient>,
) -> Result<Option<Box<dyn Reranker>>> {
    if !config.rerank.enabled {
        return Ok(None);
    }
    let reranker: Box<dyn Reranker> = match config.rerank.backend {
        RerankBackend::Local => Box::new(LocalReranker::new(&config.rerank)?),
        RerankBackend::Provider => Box::new(ProviderReranker::new(provider, &config.rerank)),
    };
    Ok(Some(reranker))
}

/// The shared scoring flow both backends delegate to.
async fn rerank_with(
    client: &dyn CompletionClient,
    model: &str,
    temperature: f32,
    max_tokens: u32,
    question: &str,
    candidates: &[(EmbeddedChunk, f32)],
) -> Vec<RerankedCandidate> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let request = CompletionRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::user(build_prompt(question, candidates))],
        max_tokens,
        temperature,
    };

    match client.send(request).await {
        Ok(response) => match parse_scores(&response.content, candidates.len()) {
            Some(scores) => candidates
                .iter()
                .enumerate()
                .map(|(i, (chunk, cosine))| RerankedCandidate {
                    chunk: chunk.clone(),
                    cosine_score: *cosine,
                    llm_score: scores.get(&(i + 1)).copied().unwrap_or(NEUTRAL_SCORE),
                })
                .collect(),
            None => {
                warn!("re-rank response unusable; assigning neutral scores");
                candidates
                    .iter()
                    .map(|(chunk, cosine)| RerankedCandidate {
                        chunk: chunk.clone(),
                        cosine_score: *cosine,
                        llm_score: NEUTRAL_SCORE,
                    })
                    .collect()
            }
        },
        Err(e) => {
            warn!("re-rank request failed, keeping cosine ordering: {e}");
            candidates
                .iter()
                .map(|(chunk, cosine)| RerankedCandidate {
                    chunk: chunk.clone(),
                    cosine_score: *cosine,
                    llm_score: *cosine,
                })
                .collect()
        }
    }
}

fn build_prompt(question: &str, candidates: &[(EmbeddedChunk, f32)]) -> String {
    let mut prompt = String::from(
        "You are a relevance judge. Score how relevant each numbered passage is \
         to the question, from 0.0 (irrelevant) to 1.0 (highly relevant).\n\
         Respond with ONLY a JSON array, one entry per passage:\n\
         [{\"id\": 1, \"score\": 0.9}, {\"id\": 2, \"score\": 0.3}]\n\n",
    );
    let _ = writeln!(prompt, "Question: {question}\n");
    prompt.push_str("Passages:\n");
    for (i, (chunk, _)) in candidates.iter().enumerate() {
        let snippet: String = chunk.text.chars().take(SNIPPET_LEN).collect();
        let _ = writeln!(prompt, "{}. {snippet}", i + 1);
    }
    prompt
}

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    id: usize,
    score: f32,
}

/// Extract the JSON array between the first `[` and the last `]`,
/// tolerating commentary around it. Returns `None` when no array is found,
/// it does not parse, or the entry count does not match the candidate
/// count — callers degrade to neutral scores in every one of those cases.
fn parse_scores(raw: &str, expected: usize) -> Option<HashMap<usize, f32>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }

    let entries: Vec<ScoreEntry> = serde_json::from_str(&raw[start..=end]).ok()?;
    if entries.len() != expected {
        return None;
    }

    Some(
        entries
            .into_iter()
            .map(|entry| (entry.id, entry.score))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionResponse;
    use crate::error::Error;

    fn candidate(text: &str, cosine: f32) -> (EmbeddedChunk, f32) {
        (
            EmbeddedChunk {
                text: text.to_string(),
                source: "s.md".to_string(),
                position: 0,
                embedding: vec![1.0, 0.0],
            },
            cosine,
        )
    }

    struct CannedClient {
        content: String,
    }

    #[async_trait]
    impl CompletionClient for CannedClient {
        async fn send(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: self.content.clone(),
                usage: None,
            })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl CompletionClient for FailingClient {
        async fn send(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Err(Error::Completion("connection refused".to_string()))
        }
    }

    #[test]
    fn parse_extracts_array_between_commentary() {
        let raw = "Sure! Here are the scores:\n[{\"id\":1,\"score\":0.9},{\"id\":2,\"score\":0.1}]\nHope that helps.";
        let scores = parse_scores(raw, 2).unwrap();
        assert_eq!(scores[&1], 0.9);
        assert_eq!(scores[&2], 0.1);
    }

    #[test]
    fn parse_rejects_missing_array() {
        assert!(parse_scores("no array here", 2).is_none());
    }

    #[test]
    fn parse_rejects_malformed_array() {
        assert!(parse_scores("[{\"id\":1,\"score\":", 1).is_none());
    }

    #[test]
    fn parse_rejects_count_mismatch() {
        let raw = "[{\"id\":1,\"score\":0.9}]";
        assert!(parse_scores(raw, 2).is_none());
    }

    #[test]
    fn prompt_enumerates_and_truncates() {
        let long_text = "x".repeat(500);
        let candidates = vec![candidate("short passage", 0.9), candidate(&long_text, 0.8)];
        let prompt = build_prompt("what is x?", &candidates);
        assert!(prompt.contains("1. short passage"));
        assert!(prompt.contains("what is x?"));
        // Truncated snippet, not the full 500 chars.
        assert!(!prompt.contains(&long_text));
        assert!(prompt.contains(&"x".repeat(SNIPPET_LEN)));
    }

    #[tokio::test]
    async fn valid_response_assigns_llm_scores_by_id() {
        let client = CannedClient {
            content: "[{\"id\":1,\"score\":0.2},{\"id\":2,\"score\":0.95}]".to_string(),
        };
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.5)];
        let ranked = rerank_with(&client, "m", 0.0, 128, "q", &candidates).await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].llm_score, 0.2);
        assert_eq!(ranked[0].cosine_score, 0.9);
        assert_eq!(ranked[1].llm_score, 0.95);
    }

    #[tokio::test]
    async fn malformed_response_falls_back_to_neutral() {
        let client = CannedClient {
            content: "I could not produce scores, sorry.".to_string(),
        };
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.5)];
        let ranked = rerank_with(&client, "m", 0.0, 128, "q", &candidates).await;
        assert!(ranked.iter().all(|c| c.llm_score == NEUTRAL_SCORE));
    }

    #[tokio::test]
    async fn truncated_response_falls_back_to_neutral() {
        let client = CannedClient {
            content: "[{\"id\":1,\"score\":0.8},{\"id\":2".to_string(),
        };
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.5)];
        let ranked = rerank_with(&client, "m", 0.0, 128, "q", &candidates).await;
        assert!(ranked.iter().all(|c| c.llm_score == NEUTRAL_SCORE));
    }

    #[tokio::test]
    async fn transport_failure_keeps_cosine_scores() {
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.5)];
        let ranked = rerank_with(&FailingClient, "m", 0.0, 128, "q", &candidates).await;
        assert_eq!(ranked[0].llm_score, 0.9);
        assert_eq!(ranked[1].llm_score, 0.5);
    }

    #[tokio::test]
    async fn empty_pool_short_circuits() {
        let ranked = rerank_with(&FailingClient, "m", 0.0, 128, "q", &[]).await;
        assert!(ranked.is_empty());
    }
}

//! Embedding collaborator interface and HTTP implementation.
//!
//! The core depends only on the [`EmbeddingClient`] trait: one vector per
//! input text, in input order, all vectors equal length for a given model.
//! That ordering contract is load-bearing — the index builder zips returned
//! vectors back onto chunks by position, so a client that reorders results
//! silently corrupts the index.
//!
//! [`HttpEmbeddingClient`] talks to any OpenAI-compatible `/embeddings`
//! endpoint with exponential backoff for transient errors:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - timeouts → surface as [`Error::Timeout`], no retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Order-preserving batch embedding.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Client for OpenAI-compatible embedding APIs (OpenAI itself, or local
/// servers such as Ollama's `/v1` endpoint).
///
/// Reads `OPENAI_API_KEY` from the environment when present; local servers
/// typically need no key.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    timeout_secs: u64,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: EmbeddingsResponse = response
                            .json()
                            .await
                            .map_err(|e| Error::Embedding(format!("invalid response: {e}")))?;
                        return into_ordered_vectors(parsed, texts.len());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::Embedding(format!("API error {status}: {text}")));
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();
                    return Err(Error::Embedding(format!("API error {status}: {text}")));
                }
                Err(e) if e.is_timeout() => {
                    return Err(Error::Timeout {
                        what: "embedding request",
                        seconds: self.timeout_secs,
                    });
                }
                Err(e) => {
                    last_err = Some(Error::Embedding(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Embedding("request failed after retries".to_string())))
    }
}

/// Sort response items by their `index` field and check the count, so the
/// trait's input-order contract holds even if the API interleaves items.
fn into_ordered_vectors(response: EmbeddingsResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut items = response.data;
    if items.len() != expected {
        return Err(Error::Embedding(format!(
            "expected {expected} embeddings, got {}",
            items.len()
        )));
    }
    items.sort_by_key(|item| item.index);
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_items_are_reordered_by_index() {
        let response = EmbeddingsResponse {
            data: vec![
                EmbeddingItem {
                    index: 1,
                    embedding: vec![0.2],
                },
                EmbeddingItem {
                    index: 0,
                    embedding: vec![0.1],
                },
            ],
        };
        let vectors = into_ordered_vectors(response, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.1], vec![0.2]]);
    }

    #[test]
    fn count_mismatch_is_an_embedding_error() {
        let response = EmbeddingsResponse {
            data: vec![EmbeddingItem {
                index: 0,
                embedding: vec![0.1],
            }],
        };
        let err = into_ordered_vectors(response, 2).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}

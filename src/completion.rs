//! Completion collaborator interface and HTTP implementations.
//!
//! [`CompletionClient`] returns an explicit, tagged [`CompletionResponse`]
//! rather than an opaque SDK object, so nothing downstream needs runtime
//! introspection to find the answer text.
//!
//! Two implementations:
//! - [`HttpCompletionClient`] — any OpenAI-compatible `/chat/completions`
//!   endpoint; used for final answers and provider-backed re-ranking.
//! - [`OllamaChatClient`] — a local Ollama instance's `/api/chat`; used by
//!   the local re-ranking backend. Ollama can deliver its payload as
//!   newline-delimited JSON fragments even with `stream: false` requested,
//!   so the client accumulates every fragment before returning.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::ChatMessage;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// One generation request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The provider's answer, reduced to what the pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn send(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

// ============ OpenAI-compatible client ============

pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpCompletionClient {
    pub fn new(base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Completion(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            timeout_secs,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn send(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    what: "completion request",
                    seconds: self.timeout_secs,
                }
            } else {
                Error::Completion(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!("API error {status}: {text}")));
        }

        let parsed: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("invalid response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Completion("response contained no choices".to_string()))?;

        Ok(CompletionResponse {
            content,
            usage: parsed.usage,
        })
    }
}

// ============ Ollama chat client ============

pub struct OllamaChatClient {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl OllamaChatClient {
    pub fn new(url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Completion(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.unwrap_or(DEFAULT_OLLAMA_URL).to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaChatClient {
    async fn send(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        what: "completion request",
                        seconds: self.timeout_secs,
                    }
                } else {
                    Error::Completion(format!(
                        "connection error (is Ollama running at {}?): {e}",
                        self.url
                    ))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!("API error {status}: {text}")));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| Error::Completion(format!("failed to read response body: {e}")))?;

        let content = collect_chat_fragments(&raw)?;
        Ok(CompletionResponse {
            content,
            usage: None,
        })
    }
}

/// Accumulate `message.content` across one or more JSON fragments into a
/// single string. A single non-streamed object is just the one-fragment
/// case.
fn collect_chat_fragments(raw: &str) -> Result<String> {
    let mut content = String::new();
    let mut saw_content = false;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| Error::Completion(format!("invalid response fragment: {e}")))?;

        if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
            return Err(Error::Completion(message.to_string()));
        }

        if let Some(piece) = value
            .pointer("/message/content")
            .and_then(|content| content.as_str())
        {
            content.push_str(piece);
            saw_content = true;
        }
    }

    if !saw_content {
        return Err(Error::Completion(
            "response contained no message content".to_string(),
        ));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object_response_is_one_fragment() {
        let raw = r#"{"message":{"role":"assistant","content":"hello"},"done":true}"#;
        assert_eq!(collect_chat_fragments(raw).unwrap(), "hello");
    }

    #[test]
    fn streamed_fragments_are_accumulated_in_order() {
        let raw = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"[{\\\"id\\\":1,\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\\\"score\\\":0.9}]\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        );
        assert_eq!(
            collect_chat_fragments(raw).unwrap(),
            "[{\"id\":1,\"score\":0.9}]"
        );
    }

    #[test]
    fn error_field_propagates() {
        let raw = r#"{"error":"model not found"}"#;
        let err = collect_chat_fragments(raw).unwrap_err();
        assert!(matches!(err, Error::Completion(_)));
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn missing_content_is_an_error() {
        let raw = r#"{"done":true}"#;
        assert!(collect_chat_fragments(raw).is_err());
    }

    #[test]
    fn garbage_fragment_is_an_error() {
        assert!(collect_chat_fragments("not json at all").is_err());
    }
}

//! Core data types that flow through the indexing and query pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded segment of one source document's text.
///
/// `position` is the zero-based index among the chunks *emitted* from the
/// same source document, not of sliding-window attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub position: usize,
}

/// A chunk paired with its embedding vector.
///
/// All embeddings within one [`Index`] share the same dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub text: String,
    pub source: String,
    pub position: usize,
    pub embedding: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            text: chunk.text,
            source: chunk.source,
            position: chunk.position,
            embedding,
        }
    }
}

/// The persisted index aggregate. Built once per index run, replaced
/// wholesale on rebuild, and read-only after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<EmbeddedChunk>,
}

/// The externally visible, score-annotated view of a retrieved chunk.
///
/// `similarity` always holds the effective score used for filtering and
/// ordering. When re-ranking ran, `cosine_score` and `llm_score` carry the
/// full provenance; otherwise both are absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub source: String,
    pub text: String,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cosine_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_score: Option<f32>,
}

/// The answer produced for one query, with the chunks that grounded it.
///
/// Retrieved chunks are ephemeral: callers persist only the question and
/// answer into conversation history, never the chunks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub answer: String,
    pub retrieved_chunks: Vec<RetrievedChunk>,
}

/// A single chat message, as sent to the completion provider and as
/// supplied by callers for history-aware retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

//! Resolved configuration for the retrieval core.
//!
//! The core never reads configuration sources itself. The (excluded)
//! application layer resolves files and environment into one [`RagConfig`]
//! value and passes it to [`IndexBuilder`](crate::indexer::IndexBuilder)
//! and [`QueryOrchestrator`](crate::query::QueryOrchestrator) at
//! construction time. `Deserialize` is derived so that layer can parse a
//! TOML section straight into this shape.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    /// Where the persisted index file lives.
    pub index_path: PathBuf,
    /// File extensions considered source documents (without the dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model name (e.g. `"text-embedding-3-small"`).
    pub model: String,
    /// OpenAI-compatible API base, e.g. `"https://api.openai.com/v1"` or a
    /// local server's `/v1` endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    /// Window width in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive windows. Must be < `chunk_size`.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Minimum effective score a chunk needs to reach the final result.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    /// First-pass pool size when re-ranking is enabled.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,
    /// How many recent non-system messages bias history-aware retrieval.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: default_relevance_threshold(),
            candidate_pool: default_candidate_pool(),
            history_window: default_history_window(),
        }
    }
}

/// Which generation backend scores the candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankBackend {
    /// A fast local model served by Ollama.
    Local,
    /// The same provider used for final answers.
    Provider,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rerank_backend")]
    pub backend: RerankBackend,
    /// Model used for scoring (e.g. `"llama3.2:1b"` for the local backend).
    #[serde(default = "default_rerank_model")]
    pub model: String,
    /// Ollama base URL for the local backend.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_rerank_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_rerank_backend(),
            model: default_rerank_model(),
            url: None,
            temperature: 0.0,
            max_tokens: default_rerank_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Model used for final answers.
    pub model: String,
    /// OpenAI-compatible API base for the completion provider.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "txt".to_string()]
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}
fn default_relevance_threshold() -> f32 {
    0.3
}
fn default_candidate_pool() -> usize {
    10
}
fn default_history_window() -> usize {
    6
}
fn default_rerank_backend() -> RerankBackend {
    RerankBackend::Local
}
fn default_rerank_model() -> String {
    "llama3.2:1b".to_string()
}
fn default_rerank_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}
fn default_generation_max_tokens() -> u32 {
    1024
}
fn default_generation_timeout_secs() -> u64 {
    60
}

impl RagConfig {
    /// Validate cross-field constraints. Called by the builder and the
    /// orchestrator at construction, so violations fail once, up front.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".into()));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be > 0".into()));
        }
        if self.retrieval.candidate_pool == 0 {
            return Err(Error::Config("retrieval.candidate_pool must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.retrieval.relevance_threshold) {
            return Err(Error::Config(
                "retrieval.relevance_threshold must be in [0.0, 1.0]".into(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(Error::Config("extensions must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> RagConfig {
        toml::from_str(
            r#"
            index_path = "data/index.json"

            [embedding]
            model = "text-embedding-3-small"

            [generation]
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn minimal_toml_gets_defaults() {
        let config = minimal_config();
        assert_eq!(config.extensions, vec!["md", "txt"]);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.retrieval.candidate_pool, 10);
        assert!(!config.rerank.enabled);
        assert_eq!(config.rerank.backend, RerankBackend::Local);
        assert!((config.generation.temperature - 0.7).abs() < f32::EPSILON);
        config.validate().unwrap();
    }

    #[test]
    fn full_toml_parses() {
        let config: RagConfig = toml::from_str(
            r#"
            index_path = "/tmp/index.json"
            extensions = ["md"]

            [embedding]
            model = "nomic-embed-text"
            base_url = "http://localhost:11434/v1"
            batch_size = 16
            timeout_secs = 10

            [chunking]
            chunk_size = 800
            overlap = 100

            [retrieval]
            relevance_threshold = 0.5
            candidate_pool = 20
            history_window = 4

            [rerank]
            enabled = true
            backend = "provider"
            model = "gpt-4o-mini"
            max_tokens = 256

            [generation]
            model = "gpt-4o"
            temperature = 0.2
            max_tokens = 2048
            "#,
        )
        .unwrap();

        assert_eq!(config.rerank.backend, RerankBackend::Provider);
        assert_eq!(config.retrieval.candidate_pool, 20);
        config.validate().unwrap();
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = minimal_config();
        config.chunking.chunk_size = 100;
        config.chunking.overlap = 100;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn threshold_must_be_in_unit_range() {
        let mut config = minimal_config();
        config.retrieval.relevance_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}

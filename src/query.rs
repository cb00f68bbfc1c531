//! Query orchestration: load index → embed → retrieve → re-rank → filter →
//! synthesize augmented prompt → generate.
//!
//! The completion provider is always called, even when no chunk survives
//! filtering — the prompt then carries an explicit "no relevant context"
//! notice instead of a context block. Re-ranking can only improve or
//! silently degrade the ordering; it can never fail the query.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::config::RagConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::models::{ChatMessage, QueryResult, RetrievedChunk};
use crate::reranker::Reranker;
use crate::similarity;
use crate::store::IndexStore;

pub const DEFAULT_TOP_K: usize = 3;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question \
    using the provided context. If the context does not contain the answer, say so \
    instead of guessing.";

pub struct QueryOrchestrator {
    config: RagConfig,
    store: IndexStore,
    embedder: Arc<dyn EmbeddingClient>,
    completion: Arc<dyn CompletionClient>,
    reranker: Option<Box<dyn Reranker>>,
}

impl QueryOrchestrator {
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingClient>,
        completion: Arc<dyn CompletionClient>,
        reranker: Option<Box<dyn Reranker>>,
    ) -> Result<Self> {
        config.validate()?;
        let store = IndexStore::new(config.index_path.clone());
        Ok(Self {
            config,
            store,
            embedder,
            completion,
            reranker,
        })
    }

    /// Answer a standalone question grounded in the indexed documents.
    pub async fn query(&self, question: &str, top_k: usize) -> Result<QueryResult> {
        self.run(question, question.to_string(), top_k).await
    }

    /// Like [`query`](Self::query), but the retrieval embedding also covers
    /// the tail of the ongoing conversation, biasing retrieval toward its
    /// topic with a single embedding call.
    pub async fn query_with_history(
        &self,
        question: &str,
        recent_messages: &[ChatMessage],
        top_k: usize,
    ) -> Result<QueryResult> {
        let embed_text = history_query_text(
            question,
            recent_messages,
            self.config.retrieval.history_window,
        );
        self.run(question, embed_text, top_k).await
    }

    async fn run(&self, question: &str, embed_text: String, top_k: usize) -> Result<QueryResult> {
        let index = self.store.load()?.ok_or_else(|| Error::IndexNotFound {
            path: self.store.path().to_path_buf(),
        })?;

        let query_vector = self
            .embedder
            .embed(&self.config.embedding.model, &[embed_text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))?;

        // Re-ranking needs a wider first pass to recover chunks the vector
        // ranking under-ranked.
        let pool_size = if self.reranker.is_some() {
            self.config.retrieval.candidate_pool.max(top_k)
        } else {
            top_k
        };
        let candidates = similarity::find_top_k(&query_vector, &index, pool_size);

        let threshold = self.config.retrieval.relevance_threshold;
        let retrieved: Vec<RetrievedChunk> = match (&self.reranker, candidates.is_empty()) {
            (Some(reranker), false) => {
                let mut ranked = reranker.rerank(question, &candidates).await;
                ranked.sort_by(|a, b| {
                    b.llm_score
                        .partial_cmp(&a.llm_score)
                        .unwrap_or(Ordering::Equal)
                });
                ranked
                    .into_iter()
                    .filter(|candidate| candidate.llm_score >= threshold)
                    .take(top_k)
                    .map(|candidate| RetrievedChunk {
                        source: candidate.chunk.source,
                        text: candidate.chunk.text,
                        similarity: candidate.llm_score,
                        cosine_score: Some(candidate.cosine_score),
                        llm_score: Some(candidate.llm_score),
                    })
                    .collect()
            }
            _ => candidates
                .into_iter()
                .filter(|(_, score)| *score >= threshold)
                .take(top_k)
                .map(|(chunk, score)| RetrievedChunk {
                    source: chunk.source,
                    text: chunk.text,
                    similarity: score,
                    cosine_score: None,
                    llm_score: None,
                })
                .collect(),
        };

        let generation = &self.config.generation;
        let request = CompletionRequest {
            model: generation.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_augmented_prompt(question, &retrieved)),
            ],
            max_tokens: generation.max_tokens,
            temperature: generation.temperature,
        };
        let response = self.completion.send(request).await?;

        Ok(QueryResult {
            answer: response.content,
            retrieved_chunks: retrieved,
        })
    }
}

/// Concatenate the last `window` non-system messages and the question into
/// the single string that gets embedded.
fn history_query_text(question: &str, recent: &[ChatMessage], window: usize) -> String {
    let relevant: Vec<&str> = recent
        .iter()
        .filter(|message| message.role != "system")
        .map(|message| message.content.as_str())
        .collect();

    let tail = &relevant[relevant.len().saturating_sub(window)..];
    if tail.is_empty() {
        question.to_string()
    } else {
        format!("{}\n{question}", tail.join("\n"))
    }
}

/// The user-turn prompt: a context block tagged with source and relevance
/// per surviving chunk, or an explicit notice when nothing survived.
fn build_augmented_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return format!(
            "No relevant context was found in the indexed documents.\n\nQuestion: {question}"
        );
    }

    let mut prompt = String::from("Context:\n\n");
    for chunk in chunks {
        prompt.push_str(&format!(
            "[{}, relevance: {:.2}]\n{}\n\n",
            chunk.source, chunk.similarity, chunk.text
        ));
    }
    prompt.push_str(&format!("Question: {question}"));
    prompt
}

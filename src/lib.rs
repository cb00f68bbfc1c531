//! # ragpipe
//!
//! A retrieval-augmented generation core: turns a folder of text documents
//! into a searchable semantic index, and at query time retrieves the most
//! relevant fragments to ground an answer produced by a language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌───────────┐   ┌────────────┐
//! │ Documents │──▶│ Chunker │──▶│ Embedding │──▶│ Index file │
//! └───────────┘   └─────────┘   │  service  │   │   (JSON)   │
//!                               └───────────┘   └─────┬──────┘
//!                                                     │
//!              ┌──────────┐   ┌──────────┐   ┌────────▼───────┐
//!   question ─▶│  Embed   │──▶│  Cosine  │──▶│ (Re-rank) →    │──▶ answer
//!              │  query   │   │  top-k   │   │ filter → LLM   │
//!              └──────────┘   └──────────┘   └────────────────┘
//! ```
//!
//! Indexing is driven by [`indexer::IndexBuilder`], querying by
//! [`query::QueryOrchestrator`]. Both take an explicit [`config::RagConfig`]
//! at construction — the core never reads configuration sources itself.
//! The terminal UI, configuration loading, chat-history persistence, and
//! provider transport details live in the calling application.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunker`] | Sliding-window, word-boundary-aware chunking |
//! | [`store`] | JSON index persistence |
//! | [`similarity`] | Cosine similarity and brute-force top-k |
//! | [`embedding`] | Embedding collaborator trait + HTTP client |
//! | [`completion`] | Completion collaborator trait + HTTP clients |
//! | [`reranker`] | Two-stage relevance re-scoring |
//! | [`indexer`] | Index-build orchestration |
//! | [`query`] | End-to-end query pipeline |
//! | [`progress`] | Build progress reporting |
//! | [`config`] | Resolved configuration value object |
//! | [`error`] | Error taxonomy |

pub mod chunker;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod models;
pub mod progress;
pub mod query;
pub mod reranker;
pub mod similarity;
pub mod store;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use indexer::IndexBuilder;
pub use models::{ChatMessage, Chunk, EmbeddedChunk, Index, QueryResult, RetrievedChunk};
pub use query::{QueryOrchestrator, DEFAULT_TOP_K};

//! Index-build orchestration: discover → chunk → embed → persist.
//!
//! The build is one sequential pipeline. Any batch's embedding failure
//! aborts the whole build — a partial index is never persisted. Zero
//! documents or zero chunks are not errors; they produce an empty, still
//! valid, still persisted index.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;
use walkdir::WalkDir;

use crate::chunker::Chunker;
use crate::config::RagConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::models::EmbeddedChunk;
use crate::progress::ProgressReporter;
use crate::store::IndexStore;

pub struct IndexBuilder {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingClient>,
    store: IndexStore,
    progress: Box<dyn ProgressReporter>,
}

impl IndexBuilder {
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingClient>,
        progress: Box<dyn ProgressReporter>,
    ) -> Result<Self> {
        config.validate()?;
        let store = IndexStore::new(config.index_path.clone());
        Ok(Self {
            config,
            embedder,
            store,
            progress,
        })
    }

    /// Build and persist a fresh index from every matching document under
    /// `source_dir`. Returns the number of chunks indexed.
    pub async fn build_index(&self, source_dir: &Path) -> Result<usize> {
        if !source_dir.is_dir() {
            return Err(Error::Config(format!(
                "source directory does not exist: {}",
                source_dir.display()
            )));
        }

        self.progress
            .report(&format!("Scanning {}", source_dir.display()));
        let documents = discover_documents(source_dir, &self.config.extensions)?;
        if documents.is_empty() {
            warn!(
                "no documents matching {:?} under {}; writing an empty index",
                self.config.extensions,
                source_dir.display()
            );
        }

        self.progress
            .report(&format!("Chunking {} documents", documents.len()));
        let chunker = Chunker::from_config(&self.config.chunking)?;
        let chunks = chunker.chunk_all(&documents);

        let batch_size = self.config.embedding.batch_size;
        let total_batches = chunks.len().div_ceil(batch_size);
        self.progress.report(&format!(
            "Embedding {} chunks in {} batches",
            chunks.len(),
            total_batches
        ));

        let model = &self.config.embedding.model;
        let mut embedded: Vec<EmbeddedChunk> = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();

            // The client returns one vector per text, in input order; the
            // zip below relies on that.
            let vectors = self
                .embedder
                .embed(model, &texts)
                .await
                .map_err(|e| batch_context(e, batch_no + 1, total_batches))?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "batch {}/{} returned {} embeddings for {} texts",
                    batch_no + 1,
                    total_batches,
                    vectors.len(),
                    batch.len()
                )));
            }

            embedded.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, embedding)| EmbeddedChunk::new(chunk, embedding)),
            );
            self.progress
                .report(&format!("Embedded batch {}/{}", batch_no + 1, total_batches));
        }

        let count = embedded.len();
        let index = IndexStore::create_index(embedded, model);
        self.progress
            .report(&format!("Saving index to {}", self.store.path().display()));
        self.store.save(&index)?;
        self.progress.report(&format!("Indexed {count} chunks"));
        Ok(count)
    }
}

/// Identify which batch failed without losing the error's kind.
fn batch_context(e: Error, batch_no: usize, total: usize) -> Error {
    match e {
        Error::Embedding(message) => {
            Error::Embedding(format!("batch {batch_no}/{total}: {message}"))
        }
        other => other,
    }
}

/// Recursively collect `(relative_path, content)` pairs for files with a
/// matching extension, sorted by path for deterministic chunk ordering.
/// Blank files are skipped with a warning.
fn discover_documents(root: &Path, extensions: &[String]) -> Result<Vec<(String, String)>> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)));
        if !matches {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let source = relative.to_string_lossy().to_string();

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            warn!(source = %source, "skipping blank document");
            continue;
        }

        documents.push((source, content));
    }

    documents.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(documents)
}

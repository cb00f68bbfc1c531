//! Sliding-window text chunker with word-boundary preservation.
//!
//! A window of `chunk_size` characters slides across the document,
//! advancing by `chunk_size - overlap` each step so consecutive chunks
//! share context. Full windows that would cut a word in half are truncated
//! at the last space past the window midpoint.

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::Chunk;

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// `chunk_size > overlap >= 0` is enforced here once, not per call.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.overlap)
    }

    /// Split one document into ordered chunks.
    ///
    /// Empty windows after trimming are discarded; `position` counts only
    /// emitted chunks. Blank input yields an empty list.
    pub fn chunk(&self, content: &str, source: &str) -> Vec<Chunk> {
        let chars: Vec<char> = content.chars().collect();
        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut position = 0usize;
        let mut start = 0usize;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let mut window = &chars[start..end];

            // Word-boundary preservation: only full, non-final windows are
            // candidates, and only when the last space sits past the midpoint.
            if end < chars.len() && window.len() == self.chunk_size {
                if let Some(space) = window.iter().rposition(|c| *c == ' ') {
                    if space > self.chunk_size / 2 {
                        window = &window[..space];
                    }
                }
            }

            let text: String = window.iter().collect();
            let text = text.trim();
            if !text.is_empty() {
                chunks.push(Chunk {
                    text: text.to_string(),
                    source: source.to_string(),
                    position,
                });
                position += 1;
            }

            if step == 0 {
                // Unreachable: new() rejects overlap >= chunk_size.
                break;
            }
            start += step;
        }

        chunks
    }

    /// Chunk every document, concatenating results in the given source
    /// order. Positions restart at 0 for each source.
    pub fn chunk_all(&self, documents: &[(String, String)]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (source, content) in documents {
            chunks.extend(self.chunk(content, source));
        }
        chunks
    }
}

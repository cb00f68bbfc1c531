//! Error taxonomy for the retrieval core.
//!
//! Each failure a caller can meaningfully react to gets its own variant:
//! a missing index drives a "build the index first" message, a corrupt
//! index drives a "rebuild" message, and provider failures identify which
//! collaborator broke. Re-ranking degradation is deliberately *not* here —
//! it is non-fatal and only ever logged.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No index file exists yet. Queries cannot proceed until one is built.
    #[error("no index found at {path}; build the index before querying")]
    IndexNotFound { path: PathBuf },

    /// The index file exists but does not deserialize.
    #[error("index file {path} is corrupt: {source}")]
    IndexCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The embedding service failed. Fatal during indexing and during
    /// query embedding.
    #[error("embedding service failure: {0}")]
    Embedding(String),

    /// The completion provider failed on the final generation call.
    #[error("completion provider failure: {0}")]
    Completion(String),

    /// An external call exceeded its configured deadline.
    #[error("{what} timed out after {seconds}s")]
    Timeout { what: &'static str, seconds: u64 },

    /// Two vectors of different lengths were compared. Always a bug if it
    /// triggers with a correctly built index.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

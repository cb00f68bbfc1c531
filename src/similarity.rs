//! Cosine similarity and brute-force top-k retrieval.
//!
//! The index is a plain in-memory list, so retrieval is a linear scan —
//! fine for the few hundred to low thousands of chunks this core targets.

use std::cmp::Ordering;

use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{EmbeddedChunk, Index};

/// Cosine of the angle between two vectors: `dot(a,b) / (‖a‖·‖b‖)`.
///
/// Vectors of different lengths are a usage error. A zero-magnitude vector
/// on either side is a defined degenerate case and yields `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return Ok(0.0);
    }

    Ok(dot / denom)
}

/// Score every chunk against the query and return the `k` best, sorted by
/// similarity descending with ties broken by original index order.
///
/// A chunk whose similarity computation fails (malformed embedding) is
/// skipped with a warning rather than aborting the search. `k == 0` or an
/// empty index yields an empty result.
pub fn find_top_k(query: &[f32], index: &Index, k: usize) -> Vec<(EmbeddedChunk, f32)> {
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(EmbeddedChunk, f32)> = Vec::with_capacity(index.chunks.len());
    for chunk in &index.chunks {
        match cosine_similarity(query, &chunk.embedding) {
            Ok(score) => scored.push((chunk.clone(), score)),
            Err(e) => warn!(
                source = %chunk.source,
                position = chunk.position,
                "skipping chunk with malformed embedding: {e}"
            ),
        }
    }

    // Vec::sort_by is stable, so equal scores keep index order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

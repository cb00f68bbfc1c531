//! JSON persistence for the index aggregate.
//!
//! The index is one flat JSON document rewritten wholesale on every save.
//! There is no concurrent-write protection; a build racing another build
//! (or a query's load) is an accepted limitation. Saves go through a temp
//! file plus rename so a cancelled build cannot leave a half-written file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{EmbeddedChunk, Index};

#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Assemble an [`Index`] from embedded chunks, stamped with the current
    /// time.
    pub fn create_index(chunks: Vec<EmbeddedChunk>, model: &str) -> Index {
        Index {
            model: model.to_string(),
            created_at: Utc::now(),
            chunks,
        }
    }

    /// Serialize the full index, creating parent directories if absent and
    /// replacing any existing file.
    pub fn save(&self, index: &Index) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(index).map_err(io::Error::other)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load the persisted index.
    ///
    /// Returns `Ok(None)` when the file is absent or blank — callers decide
    /// whether that is an error. A file that exists but fails to parse is
    /// [`Error::IndexCorrupt`].
    pub fn load(&self) -> Result<Option<Index>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let index = serde_json::from_str(&raw).map_err(|source| Error::IndexCorrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> Index {
        IndexStore::create_index(
            vec![
                EmbeddedChunk {
                    text: "alpha".to_string(),
                    source: "a.md".to_string(),
                    position: 0,
                    embedding: vec![0.123_456_79, -0.5, 1.0],
                },
                EmbeddedChunk {
                    text: "beta".to_string(),
                    source: "b.md".to_string(),
                    position: 0,
                    embedding: vec![0.0, 0.999_999_9, -0.000_001],
                },
            ],
            "test-model",
        )
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IndexStore::new(tmp.path().join("index.json"));

        let index = sample_index();
        store.save(&index).unwrap();
        let loaded = store.load().unwrap().expect("index should exist");
        assert_eq!(loaded, index);
    }

    #[test]
    fn save_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IndexStore::new(tmp.path().join("nested/deeper/index.json"));
        store.save(&sample_index()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn save_replaces_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IndexStore::new(tmp.path().join("index.json"));

        store.save(&sample_index()).unwrap();
        let empty = IndexStore::create_index(Vec::new(), "other-model");
        store.save(&empty).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.model, "other-model");
        assert!(loaded.chunks.is_empty());
    }

    #[test]
    fn missing_file_is_none_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IndexStore::new(tmp.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn blank_file_is_none_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.json");
        fs::write(&path, "  \n").unwrap();
        let store = IndexStore::new(path);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn unparseable_file_is_corrupt_not_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.json");
        fs::write(&path, "{ not json").unwrap();
        let store = IndexStore::new(path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::IndexCorrupt { .. }));
    }

    #[test]
    fn empty_index_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IndexStore::new(tmp.path().join("index.json"));
        let index = IndexStore::create_index(Vec::new(), "m");
        store.save(&index).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), index);
    }
}

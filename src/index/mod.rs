//! Per-session vector index: upsert, cosine top-K search, durable storage
//!
//! One index per session, persisted as a single JSON file keyed by the
//! session identifier. Entries are keyed by chunk id in a `BTreeMap`, so
//! iteration order is document order and upserts are idempotent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, Locator};

/// One stored chunk with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Chunk text
    pub text: String,
    /// Source location
    pub locator: Locator,
    /// Source block the chunk was cut from
    pub block_id: u32,
}

/// A search match
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Chunk identifier
    pub chunk_id: String,
    /// Cosine similarity against the query (higher is better)
    pub score: f32,
    /// Chunk text
    pub text: String,
    /// Source location
    pub locator: Locator,
}

/// Per-session vector store
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Owning session
    session_id: Uuid,
    /// Dimensionality, fixed by the first inserted vector
    dimensions: Option<usize>,
    /// Entries keyed by chunk id
    entries: BTreeMap<String, IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index for a session
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            dimensions: None,
            entries: BTreeMap::new(),
        }
    }

    /// Owning session id
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Number of stored chunks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality of stored vectors, if any are stored
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Insert or replace a chunk by id.
    ///
    /// The first vector fixes the index dimensionality; later mismatches
    /// are rejected rather than silently corrupting ranking.
    pub fn upsert(&mut self, chunk: &Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::index("Refusing to store an empty vector"));
        }

        match self.dimensions {
            None => self.dimensions = Some(vector.len()),
            Some(dims) if dims != vector.len() => {
                return Err(Error::index(format!(
                    "Dimension mismatch: index holds {}-dim vectors, got {}",
                    dims,
                    vector.len()
                )));
            }
            Some(_) => {}
        }

        self.entries.insert(
            chunk.id.clone(),
            IndexEntry {
                vector,
                text: chunk.text.clone(),
                locator: chunk.locator.clone(),
                block_id: chunk.block_id,
            },
        );

        Ok(())
    }

    /// Top-K cosine similarity search.
    ///
    /// Results are ordered by descending score, ties broken by ascending
    /// chunk id for determinism. `k` larger than the stored count returns
    /// every entry.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if let Some(dims) = self.dimensions {
            if query.len() != dims {
                return Err(Error::index(format!(
                    "Dimension mismatch: index holds {}-dim vectors, query has {}",
                    dims,
                    query.len()
                )));
            }
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|(chunk_id, entry)| SearchHit {
                chunk_id: chunk_id.clone(),
                score: cosine_similarity(query, &entry.vector),
                text: entry.text.clone(),
                locator: entry.locator.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// All chunks in document order, for whole-document passes
    pub fn chunks_in_order(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Write the full index durably under the storage directory.
    ///
    /// Written to a temp file then renamed, so a crash never leaves a
    /// half-written index behind.
    pub fn persist(&self, storage_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(storage_dir)?;

        let path = Self::index_path(storage_dir, self.session_id);
        let tmp = path.with_extension("json.tmp");

        let data = serde_json::to_vec(self)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;

        tracing::debug!(
            session_id = %self.session_id,
            entries = self.entries.len(),
            path = %path.display(),
            "persisted index"
        );

        Ok(())
    }

    /// Load a persisted index for the session
    pub fn load(storage_dir: &Path, session_id: Uuid) -> Result<Self> {
        let path = Self::index_path(storage_dir, session_id);

        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SessionNotFound(session_id));
            }
            Err(e) => return Err(e.into()),
        };

        let index: Self = serde_json::from_slice(&data)?;

        if index.session_id != session_id {
            return Err(Error::index(format!(
                "Index file for {} claims session {}",
                session_id, index.session_id
            )));
        }

        Ok(index)
    }

    /// Delete the persisted index file; a missing file is not an error
    pub fn destroy(storage_dir: &Path, session_id: Uuid) -> Result<()> {
        let path = Self::index_path(storage_dir, session_id);

        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a persisted index exists for the session
    pub fn exists(storage_dir: &Path, session_id: Uuid) -> bool {
        Self::index_path(storage_dir, session_id).is_file()
    }

    fn index_path(storage_dir: &Path, session_id: Uuid) -> PathBuf {
        storage_dir.join(format!("{}.json", session_id))
    }
}

/// Cosine similarity of two vectors; zero when either has no magnitude
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: u32, text: &str) -> Chunk {
        Chunk::new(Uuid::nil(), id, text.to_string(), Locator::default(), 0)
    }

    fn filled_index() -> VectorIndex {
        let mut index = VectorIndex::new(Uuid::new_v4());
        index.upsert(&chunk(0, "north"), vec![1.0, 0.0]).unwrap();
        index.upsert(&chunk(1, "east"), vec![0.0, 1.0]).unwrap();
        index.upsert(&chunk(2, "northeast"), vec![1.0, 1.0]).unwrap();
        index
    }

    #[test]
    fn test_search_ranks_by_cosine() {
        let index = filled_index();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "north");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].text, "northeast");
    }

    #[test]
    fn test_k_larger_than_len_returns_all() {
        let index = filled_index();
        let hits = index.search(&[1.0, 0.0], 50).unwrap();
        assert_eq!(hits.len(), 3);
        // Still ranked
        assert_eq!(hits[0].text, "north");
    }

    #[test]
    fn test_ties_break_on_lowest_chunk_id() {
        let mut index = VectorIndex::new(Uuid::new_v4());
        // Identical vectors, identical scores
        index.upsert(&chunk(7, "later"), vec![1.0, 0.0]).unwrap();
        index.upsert(&chunk(3, "earlier"), vec![1.0, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk_id, "00003");
        assert_eq!(hits[1].chunk_id, "00007");
    }

    #[test]
    fn test_upsert_is_idempotent_by_chunk_id() {
        let mut index = VectorIndex::new(Uuid::new_v4());
        index.upsert(&chunk(0, "old text"), vec![1.0, 0.0]).unwrap();
        index.upsert(&chunk(0, "new text"), vec![0.0, 1.0]).unwrap();

        assert_eq!(index.len(), 1);
        let hits = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].text, "new text");
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::new(Uuid::new_v4());
        index.upsert(&chunk(0, "a"), vec![1.0, 0.0]).unwrap();

        let err = index.upsert(&chunk(1, "b"), vec![1.0, 0.0, 0.0]).unwrap_err();
        assert_eq!(err.code(), "index_error");

        let err = index.search(&[1.0], 1).unwrap_err();
        assert_eq!(err.code(), "index_error");
    }

    #[test]
    fn test_persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let index = filled_index();
        let session_id = index.session_id();

        index.persist(dir.path()).unwrap();
        let loaded = VectorIndex::load(dir.path(), session_id).unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimensions(), Some(2));
        let hits = loaded.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].text, "north");
    }

    #[test]
    fn test_load_missing_session_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Uuid::new_v4();
        let err = VectorIndex::load(dir.path(), missing).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(id) if id == missing));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let index = filled_index();
        let session_id = index.session_id();

        index.persist(dir.path()).unwrap();
        assert!(VectorIndex::exists(dir.path(), session_id));

        VectorIndex::destroy(dir.path(), session_id).unwrap();
        assert!(!VectorIndex::exists(dir.path(), session_id));

        // Destroying again is a no-op
        VectorIndex::destroy(dir.path(), session_id).unwrap();
    }

    #[test]
    fn test_chunks_in_order_follows_document_order() {
        let mut index = VectorIndex::new(Uuid::new_v4());
        index.upsert(&chunk(2, "third"), vec![1.0]).unwrap();
        index.upsert(&chunk(0, "first"), vec![1.0]).unwrap();
        index.upsert(&chunk(1, "second"), vec![1.0]).unwrap();

        let texts: Vec<&str> = index.chunks_in_order().map(|(_, e)| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_zero_vector_query_scores_zero() {
        let index = filled_index();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert!(hits.iter().all(|h| h.score == 0.0));
        // Deterministic order even with all-equal scores
        assert_eq!(hits[0].chunk_id, "00000");
    }
}

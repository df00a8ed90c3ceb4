//! In-memory vector index and its persistence.
//!
//! A [`VectorIndex`] is a self-contained set of (chunk, vector) entries
//! built under one embedding model. It never references another index:
//! [`VectorIndex::merge_from`] copies entries by value.
//!
//! Search is brute-force cosine similarity. Results are ordered
//! nearest-first with ties broken by insertion order, so identical
//! queries against an unchanged index always return the same list.
//!
//! Persistence lives in [`disk`]; writer serialization in [`lock`].

pub mod disk;
pub mod lock;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::embedding::{check_vectors, cosine_similarity, embed_query, Embedder};
use crate::error::{Error, Result};
use crate::models::Chunk;

pub use lock::LocationLocks;

/// One indexed chunk with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned by [`VectorIndex::similarity_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine similarity to the query.
    pub score: f32,
    /// Insertion position inside the index.
    pub position: usize,
}

/// How [`VectorIndex::merge_from`] treats chunks already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Append every entry. Repeated merges of one document accumulate duplicates.
    #[default]
    KeepDuplicates,
    /// Skip entries whose chunk text (by SHA-256) is already present.
    SkipSameText,
}

impl MergeMode {
    pub fn from_dedup(dedup: bool) -> Self {
        if dedup {
            MergeMode::SkipSameText
        } else {
            MergeMode::KeepDuplicates
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    /// On-disk version this index was loaded from or last saved as; 0 if never persisted.
    version: u64,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(model: impl Into<String>, dims: usize) -> Self {
        Self {
            model: model.into(),
            dims,
            version: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn from_parts(model: String, dims: usize, version: u64, entries: Vec<IndexEntry>) -> Self {
        Self {
            model,
            dims,
            version,
            entries,
        }
    }

    /// Embed every chunk and assemble a fresh index.
    ///
    /// Fails with [`Error::Chunking`] for an empty chunk list and with
    /// [`Error::Embedding`] if the collaborator fails or returns vectors
    /// of inconsistent dimensionality.
    pub async fn build(embedder: &dyn Embedder, chunks: Vec<Chunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::Chunking("no chunks to index".to_string()));
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        let dims = check_vectors(&vectors, chunks.len())?;
        if dims != embedder.dims() {
            return Err(Error::Embedding(format!(
                "model {} returned {} dims, configured for {}",
                embedder.model_name(),
                dims,
                embedder.dims()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();
        tracing::debug!(model = embedder.model_name(), dims, "built index");
        Ok(Self::from_parts(embedder.model_name().to_string(), dims, 0, entries))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Embed `query` and return at most `k` nearest chunks.
    ///
    /// The embedder must be the one the index was built with; a model or
    /// dimensionality mismatch is an [`Error::Embedding`].
    pub async fn similarity_search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if embedder.model_name() != self.model {
            return Err(Error::Embedding(format!(
                "index built with model {}, queried with {}",
                self.model,
                embedder.model_name()
            )));
        }
        let query_vec = embed_query(embedder, query).await?;
        check_vectors(std::slice::from_ref(&query_vec), 1)?;
        if query_vec.len() != self.dims {
            return Err(Error::Embedding(format!(
                "query has {} dims, index has {}",
                query_vec.len(),
                self.dims
            )));
        }
        Ok(self.search_vector(&query_vec, k))
    }

    /// Rank entries against an already-embedded query.
    pub fn search_vector(&self, query_vec: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query_vec, &e.vector)))
            .collect();
        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(position, score)| SearchHit {
                chunk: self.entries[position].chunk.clone(),
                score,
                position,
            })
            .collect()
    }

    /// Append the entries of `other`, preserving their source labels.
    ///
    /// Returns the number of entries appended. Fails with [`Error::Merge`]
    /// if the two indexes were built under different models or dimensions.
    pub fn merge_from(&mut self, other: &VectorIndex, mode: MergeMode) -> Result<usize> {
        if other.dims != self.dims {
            return Err(Error::Merge(format!(
                "dimension mismatch: target has {}, source has {}",
                self.dims, other.dims
            )));
        }
        if other.model != self.model {
            return Err(Error::Merge(format!(
                "model mismatch: target uses {}, source uses {}",
                self.model, other.model
            )));
        }

        let before = self.entries.len();
        match mode {
            MergeMode::KeepDuplicates => self.entries.extend(other.entries.iter().cloned()),
            MergeMode::SkipSameText => {
                let mut seen: HashSet<[u8; 32]> =
                    self.entries.iter().map(|e| text_hash(&e.chunk.text)).collect();
                for entry in &other.entries {
                    if seen.insert(text_hash(&entry.chunk.text)) {
                        self.entries.push(entry.clone());
                    }
                }
            }
        }
        Ok(self.entries.len() - before)
    }

    /// Persist as a new version at `location`, keeping `retain` versions.
    ///
    /// See [`disk::save`] for the atomicity guarantees.
    pub fn save(&mut self, location: &Path, retain: usize) -> Result<u64> {
        let version = disk::save(self, location, retain)?;
        self.version = version;
        Ok(version)
    }

    /// Load the live version at `location`.
    pub fn load(location: &Path) -> Result<Self> {
        disk::load(location)
    }

    /// [`save`](Self::save) on the blocking thread pool. Returns the index
    /// with its new version number.
    pub async fn save_async(mut self, location: PathBuf, retain: usize) -> Result<Self> {
        tokio::task::spawn_blocking(move || {
            self.save(&location, retain)?;
            Ok(self)
        })
        .await
        .map_err(join_error)?
    }

    /// [`load`](Self::load) on the blocking thread pool.
    pub async fn load_async(location: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || disk::load(&location))
            .await
            .map_err(join_error)?
    }
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Store(format!("index I/O task failed: {}", e))
}

fn text_hash(text: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(text.as_bytes()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn chunks(source: &str, texts: &[&str]) -> Vec<Chunk> {
        texts.iter().map(|t| Chunk::new(*t, source)).collect()
    }

    #[tokio::test]
    async fn test_save_and_load_off_the_runtime() {
        let tmp = tempfile::TempDir::new().unwrap();
        let loc = tmp.path().join("doc1_index");
        let e = HashingEmbedder::new(32);
        let index = VectorIndex::build(&e, chunks("doc1", &["oil", "garbage"]))
            .await
            .unwrap();
        let saved = index.save_async(loc.clone(), 2).await.unwrap();
        assert_eq!(saved.version(), 1);

        let loaded = VectorIndex::load_async(loc.clone()).await.unwrap();
        assert_eq!(loaded.entries(), saved.entries());
        assert!(disk::remove_async(loc.clone()).await.unwrap());
        assert!(matches!(
            VectorIndex::load_async(loc).await,
            Err(Error::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_build_and_search() {
        let e = HashingEmbedder::new(128);
        let index = VectorIndex::build(
            &e,
            chunks(
                "doc1",
                &[
                    "Ships must not discharge oil within 12 nautical miles.",
                    "Every ship shall carry lifejackets for each person on board.",
                ],
            ),
        )
        .await
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dims(), 128);
        assert_eq!(index.version(), 0);

        let hits = index.similarity_search(&e, "discharge oil", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[0].chunk.source, "doc1");
    }

    #[tokio::test]
    async fn test_build_rejects_empty() {
        let e = HashingEmbedder::new(8);
        let err = VectorIndex::build(&e, Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::Chunking(_)));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::new("m", 2);
        for t in ["a", "b", "c"] {
            index.entries.push(IndexEntry {
                chunk: Chunk::new(t, "s"),
                vector: vec![1.0, 0.0],
            });
        }
        let hits = index.search_vector(&[1.0, 0.0], 2);
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let mut index = VectorIndex::new("m", 2);
        index.entries.push(IndexEntry {
            chunk: Chunk::new("only", "s"),
            vector: vec![0.0, 1.0],
        });
        assert_eq!(index.search_vector(&[1.0, 0.0], 10).len(), 1);
        assert!(index.search_vector(&[1.0, 0.0], 0).is_empty());
    }

    #[tokio::test]
    async fn test_merge_counts_and_duplicates() {
        let e = HashingEmbedder::new(32);
        let mut a = VectorIndex::build(&e, chunks("shared", &["one", "two"])).await.unwrap();
        let b = VectorIndex::build(&e, chunks("doc1", &["three", "one"])).await.unwrap();

        assert_eq!(a.merge_from(&b, MergeMode::KeepDuplicates).unwrap(), 2);
        assert_eq!(a.len(), 4);
        assert_eq!(a.merge_from(&b, MergeMode::KeepDuplicates).unwrap(), 2);
        assert_eq!(a.len(), 6);
        assert_eq!(a.chunks().filter(|c| c.source == "doc1").count(), 4);
    }

    #[tokio::test]
    async fn test_merge_skip_same_text() {
        let e = HashingEmbedder::new(32);
        let mut a = VectorIndex::build(&e, chunks("shared", &["one", "two"])).await.unwrap();
        let b = VectorIndex::build(&e, chunks("doc1", &["three", "one"])).await.unwrap();
        assert_eq!(a.merge_from(&b, MergeMode::SkipSameText).unwrap(), 1);
        assert_eq!(a.merge_from(&b, MergeMode::SkipSameText).unwrap(), 0);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_merge_dimension_mismatch() {
        let mut a = VectorIndex::new("m", 4);
        let b = VectorIndex::new("m", 8);
        assert!(matches!(a.merge_from(&b, MergeMode::default()), Err(Error::Merge(_))));
        let c = VectorIndex::new("other", 4);
        assert!(matches!(a.merge_from(&c, MergeMode::default()), Err(Error::Merge(_))));
    }

    #[tokio::test]
    async fn test_search_with_other_model_fails() {
        let index = VectorIndex::new("models/embedding-001", 16);
        let e = HashingEmbedder::new(16);
        let err = index.similarity_search(&e, "q", 4).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}

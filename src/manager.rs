//! Index lifecycle: which index lives where, and what happens to it.
//!
//! The [`IndexManager`] maps document names to index locations and
//! enforces the lifecycle policy:
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`create_or_replace`](IndexManager::create_or_replace) | Build and persist a per-document index |
//! | [`ingest`](IndexManager::ingest) | Chunk a document, index it, record its metadata |
//! | [`promote_to_shared`](IndexManager::promote_to_shared) | Copy a document's chunks into the shared index |
//! | [`delete_all`](IndexManager::delete_all) | Remove every per-document index |
//! | [`bootstrap_shared`](IndexManager::bootstrap_shared) | Seed the shared index once |
//!
//! Writers on one location are serialized by [`LocationLocks`]; readers go
//! straight to disk and rely on the atomic version swap.
//!
//! # Replace hazard
//!
//! With `replace_existing = true` the old index is deleted *before* the new
//! one is built. If the build fails the document is left un-indexed and has
//! to be ingested again. With `replace_existing = false` the configured
//! [`WhenPresent`] policy applies; `overwrite` builds first and swaps the
//! new version in atomically.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::chunk::Chunker;
use crate::config::{Config, WhenPresent};
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::metadata::{IndexRecord, MetadataStore};
use crate::models::{validate_name, Chunk, Document, IndexTarget};
use crate::store::{disk, LocationLocks, MergeMode, VectorIndex};

const INDEX_SUFFIX: &str = "_index";

/// Where indexes live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLayout {
    pub custom_dir: PathBuf,
    pub shared_dir: PathBuf,
}

impl IndexLayout {
    pub fn new(custom_dir: impl Into<PathBuf>, shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            custom_dir: custom_dir.into(),
            shared_dir: shared_dir.into(),
        }
    }

    pub fn document_dir(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.custom_dir.join(format!("{}{}", name, INDEX_SUFFIX)))
    }

    pub fn location(&self, target: &IndexTarget) -> Result<PathBuf> {
        match target {
            IndexTarget::Shared => Ok(self.shared_dir.clone()),
            IndexTarget::Document(name) => self.document_dir(name),
        }
    }
}

/// Lifecycle policy knobs.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub retain_versions: usize,
    pub when_present: WhenPresent,
    pub merge_mode: MergeMode,
    pub uploaded_by: String,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            retain_versions: 2,
            when_present: WhenPresent::Overwrite,
            merge_mode: MergeMode::KeepDuplicates,
            uploaded_by: "admin".to_string(),
        }
    }
}

/// Result of [`IndexManager::create_or_replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub location: PathBuf,
    pub version: u64,
    pub chunk_count: usize,
    /// An existing index was deleted before the build.
    pub replaced: bool,
}

/// Result of [`IndexManager::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub name: String,
    pub page_count: usize,
    pub word_count: usize,
    pub chunk_count: usize,
    pub preview: String,
    pub version: u64,
}

/// Result of [`IndexManager::promote_to_shared`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoteOutcome {
    pub appended: usize,
    pub shared_chunks: usize,
    pub version: u64,
}

pub struct IndexManager {
    layout: IndexLayout,
    options: ManagerOptions,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    metadata: Arc<dyn MetadataStore>,
    locks: LocationLocks,
}

impl IndexManager {
    pub fn new(
        layout: IndexLayout,
        options: ManagerOptions,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            layout,
            options,
            chunker,
            embedder,
            metadata,
            locks: LocationLocks::new(),
        }
    }

    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Result<Self> {
        let chunker = Chunker::new(config.chunking.max_chars, config.chunking.overlap_chars)?;
        let options = ManagerOptions {
            retain_versions: config.index.retain_versions,
            when_present: config.lifecycle.when_present,
            merge_mode: MergeMode::from_dedup(config.lifecycle.merge_dedup),
            uploaded_by: config.lifecycle.uploaded_by.clone(),
        };
        let layout = IndexLayout::new(&config.index.custom_dir, &config.index.shared_dir);
        Ok(Self::new(layout, options, chunker, embedder, metadata))
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub(crate) fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub(crate) fn locks(&self) -> &LocationLocks {
        &self.locks
    }

    /// Load the live version of `target`.
    pub fn load(&self, target: &IndexTarget) -> Result<VectorIndex> {
        VectorIndex::load(&self.layout.location(target)?)
    }

    /// True when a published per-document index exists for `name`.
    pub fn exists(&self, name: &str) -> Result<bool> {
        let location = self.layout.document_dir(name)?;
        Ok(disk::current_version(&location)?.is_some())
    }

    /// Names of documents with an index directory, sorted.
    pub fn list_documents(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.layout.custom_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.layout.custom_dir, e)),
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir() && e.path() != self.layout.shared_dir)
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(INDEX_SUFFIX))
                    .filter(|n| validate_name(n).is_ok())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Split a document into chunks labelled with its name and start page.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let text = doc.text();
        let offsets = doc.page_offsets();
        self.chunker
            .spans(&text)
            .into_iter()
            .map(|span| {
                let page = offsets
                    .iter()
                    .take_while(|(start, _)| *start <= span.start)
                    .last()
                    .map(|(_, page)| *page);
                let chunk = Chunk::new(&text[span], &doc.name);
                match page {
                    Some(p) => chunk.with_page(p),
                    None => chunk,
                }
            })
            .collect()
    }

    /// Build and persist the index for `name` from `chunks`.
    ///
    /// If an index exists and `replace_existing` is set, it is deleted
    /// before the build. Otherwise the configured [`WhenPresent`] policy
    /// decides between an atomic overwrite and [`Error::IndexExists`].
    pub async fn create_or_replace(
        &self,
        name: &str,
        chunks: Vec<Chunk>,
        replace_existing: bool,
    ) -> Result<CreateOutcome> {
        let location = self.layout.document_dir(name)?;
        let _guard = self.locks.lock(&location).await;

        let mut replaced = false;
        if disk::has_artifacts(&location) {
            if replace_existing {
                disk::remove_async(location.clone()).await?;
                replaced = true;
                tracing::info!(document = name, location = %location.display(), "deleted existing index before rebuild");
            } else if self.options.when_present == WhenPresent::Reject {
                return Err(Error::IndexExists(name.to_string()));
            }
        }

        let index = VectorIndex::build(self.embedder.as_ref(), chunks)
            .await?
            .save_async(location.clone(), self.options.retain_versions)
            .await?;
        let version = index.version();
        tracing::info!(document = name, chunks = index.len(), version, replaced, "index created");

        Ok(CreateOutcome {
            location,
            version,
            chunk_count: index.len(),
            replaced,
        })
    }

    /// Chunk, index, and record one document.
    pub async fn ingest(&self, doc: &Document, replace_existing: bool) -> Result<IngestSummary> {
        validate_name(&doc.name)?;
        let chunks = self.chunk_document(doc);
        let outcome = self.create_or_replace(&doc.name, chunks, replace_existing).await?;

        let preview = doc.preview();
        let record = IndexRecord {
            name: doc.name.clone(),
            created_at: Utc::now(),
            page_count: doc.page_count(),
            word_count: doc.word_count(),
            chunk_count: outcome.chunk_count,
            preview: preview.clone(),
            index_path: outcome.location.clone(),
            uploaded_by: self.options.uploaded_by.clone(),
        };
        self.metadata.upsert(record).await?;

        Ok(IngestSummary {
            name: doc.name.clone(),
            page_count: doc.page_count(),
            word_count: doc.word_count(),
            chunk_count: outcome.chunk_count,
            preview,
            version: outcome.version,
        })
    }

    /// Merge the per-document index for `name` into the shared index.
    ///
    /// Both indexes must exist. The merge happens in memory and the shared
    /// index is saved only afterwards, so a failure at any step leaves both
    /// locations as they were. The per-document index is never modified.
    pub async fn promote_to_shared(&self, name: &str) -> Result<PromoteOutcome> {
        let source_location = self.layout.document_dir(name)?;
        let shared = self.layout.shared_dir.clone();
        let _guard = self.locks.lock(&shared).await;

        let source = VectorIndex::load_async(source_location).await?;
        let mut target = VectorIndex::load_async(shared.clone()).await?;
        let appended = target.merge_from(&source, self.options.merge_mode)?;
        let target = target
            .save_async(shared, self.options.retain_versions)
            .await?;
        let version = target.version();

        tracing::info!(
            document = name,
            appended,
            shared_chunks = target.len(),
            version,
            "promoted document into shared index"
        );
        Ok(PromoteOutcome {
            appended,
            shared_chunks: target.len(),
            version,
        })
    }

    /// Remove every per-document index. The shared index is untouched.
    ///
    /// Returns the number of indexes removed. There is no confirmation
    /// step here.
    pub async fn delete_all(&self) -> Result<usize> {
        let mut removed = 0;
        for name in self.list_documents()? {
            let location = self.layout.document_dir(&name)?;
            if is_same_dir(&location, &self.layout.shared_dir) {
                continue;
            }
            let _guard = self.locks.lock(&location).await;
            if disk::remove_async(location.clone()).await? {
                removed += 1;
            }
        }
        self.locks.prune();
        tracing::info!(removed, "deleted all per-document indexes");
        Ok(removed)
    }
}

fn is_same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::metadata::MemoryMetadataStore;
    use tempfile::TempDir;

    fn manager(tmp: &TempDir, options: ManagerOptions) -> (IndexManager, Arc<MemoryMetadataStore>) {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let m = IndexManager::new(
            IndexLayout::new(tmp.path().join("custom"), tmp.path().join("shared")),
            options,
            Chunker::new(200, 20).unwrap(),
            Arc::new(HashingEmbedder::new(64)),
            metadata.clone(),
        );
        (m, metadata)
    }

    #[test]
    fn test_layout_paths() {
        let layout = IndexLayout::new("faiss_indexes", "marine_faiss_index");
        assert_eq!(
            layout.document_dir("doc1.pdf").unwrap(),
            PathBuf::from("faiss_indexes/doc1.pdf_index")
        );
        assert_eq!(layout.location(&IndexTarget::Shared).unwrap(), PathBuf::from("marine_faiss_index"));
        assert!(matches!(layout.document_dir("../x"), Err(Error::InvalidName(_))));
    }

    #[test]
    fn test_chunk_document_attributes_pages() {
        let tmp = TempDir::new().unwrap();
        let (m, _) = manager(&tmp, ManagerOptions::default());
        let page = "Oil record book entries shall be made. ".repeat(8);
        let doc = Document::from_pages("doc1", vec![page.clone(), page]);
        let chunks = m.chunk_document(&doc);
        assert!(chunks.len() > 2);
        assert!(chunks.iter().all(|c| c.source == "doc1"));
        assert_eq!(chunks[0].page, Some(1));
        assert_eq!(chunks.last().unwrap().page, Some(2));
    }

    #[tokio::test]
    async fn test_ingest_records_metadata() {
        let tmp = TempDir::new().unwrap();
        let (m, metadata) = manager(&tmp, ManagerOptions::default());
        let doc = Document::from_pages("doc1", vec!["Ships must not discharge oil.".to_string()]);
        let summary = m.ingest(&doc, true).await.unwrap();
        assert_eq!(summary.chunk_count, 1);
        assert_eq!(summary.word_count, 5);
        assert_eq!(summary.version, 1);
        assert!(m.exists("doc1").unwrap());

        let record = metadata.get("doc1").await.unwrap().unwrap();
        assert_eq!(record.chunk_count, 1);
        assert_eq!(record.uploaded_by, "admin");
        assert!(record.index_path.ends_with("doc1_index"));
    }

    #[tokio::test]
    async fn test_reject_policy() {
        let tmp = TempDir::new().unwrap();
        let options = ManagerOptions {
            when_present: WhenPresent::Reject,
            ..Default::default()
        };
        let (m, _) = manager(&tmp, options);
        m.create_or_replace("doc1", vec![Chunk::new("a", "doc1")], false)
            .await
            .unwrap();
        let err = m
            .create_or_replace("doc1", vec![Chunk::new("b", "doc1")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexExists(_)));
        // Replace still goes through.
        let out = m
            .create_or_replace("doc1", vec![Chunk::new("b", "doc1")], true)
            .await
            .unwrap();
        assert!(out.replaced);
    }

    #[tokio::test]
    async fn test_overwrite_policy_keeps_versioning() {
        let tmp = TempDir::new().unwrap();
        let (m, _) = manager(&tmp, ManagerOptions::default());
        let first = m
            .create_or_replace("doc1", vec![Chunk::new("a", "doc1")], false)
            .await
            .unwrap();
        let second = m
            .create_or_replace("doc1", vec![Chunk::new("b", "doc1"), Chunk::new("c", "doc1")], false)
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!(!second.replaced);
        let loaded = m.load(&IndexTarget::Document("doc1".into())).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_list_and_delete_all() {
        let tmp = TempDir::new().unwrap();
        let (m, _) = manager(&tmp, ManagerOptions::default());
        assert!(m.list_documents().unwrap().is_empty());
        for name in ["b.pdf", "a.pdf"] {
            m.create_or_replace(name, vec![Chunk::new("text", name)], true)
                .await
                .unwrap();
        }
        std::fs::create_dir_all(tmp.path().join("shared")).unwrap();
        assert_eq!(m.list_documents().unwrap(), vec!["a.pdf", "b.pdf"]);

        assert_eq!(m.delete_all().await.unwrap(), 2);
        assert!(m.list_documents().unwrap().is_empty());
        assert!(m.locks().is_empty());
        assert!(tmp.path().join("shared").exists());
    }

    #[tokio::test]
    async fn test_shared_history_key_is_not_a_document_name() {
        let tmp = TempDir::new().unwrap();
        let (m, _) = manager(&tmp, ManagerOptions::default());
        let doc = Document::from_pages("marine", vec!["Ships must not discharge oil.".to_string()]);
        let err = m.ingest(&doc, true).await.unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)));
        assert!(m.list_documents().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_promote_requires_both_sides() {
        let tmp = TempDir::new().unwrap();
        let (m, _) = manager(&tmp, ManagerOptions::default());
        let err = m.promote_to_shared("doc1").await.unwrap_err();
        assert!(err.is_not_found());

        m.create_or_replace("doc1", vec![Chunk::new("a", "doc1")], true)
            .await
            .unwrap();
        let err = m.promote_to_shared("doc1").await.unwrap_err();
        assert!(err.is_not_found());
    }
}

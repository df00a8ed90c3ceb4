//! One-time seeding of the shared index from the bundled regulation PDFs.
//!
//! Seeding runs once per index location: if anything is present at the
//! shared location, bootstrap does nothing. Every seed chunk carries the
//! same shared source label; the per-page `[Source: ..., Page n]` markers
//! inside the text keep the finer attribution.

use std::path::PathBuf;

use crate::error::Result;
use crate::extract::{document_from_path, TextExtractor};
use crate::manager::IndexManager;
use crate::models::{Chunk, Document};
use crate::store::{disk, VectorIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The shared location already had content; nothing was written.
    AlreadyPresent,
    Built { chunks: usize, version: u64 },
}

/// Concatenate seed pages with source/page markers.
pub fn seed_text(seeds: &[Document]) -> String {
    let mut text = String::new();
    for doc in seeds {
        for (i, page) in doc.pages.iter().enumerate() {
            if page.is_empty() {
                continue;
            }
            text.push_str(&format!("[Source: {}, Page {}]\n{}\n", doc.name, i + 1, page));
        }
    }
    text
}

/// Extract every seed file. Fails on the first unreadable one.
pub fn load_seed_documents(extractor: &dyn TextExtractor, paths: &[PathBuf]) -> Result<Vec<Document>> {
    paths
        .iter()
        .map(|path| document_from_path(extractor, path))
        .collect()
}

impl IndexManager {
    /// True if the shared location has any content at all.
    pub fn shared_present(&self) -> bool {
        disk::has_artifacts(&self.layout().shared_dir)
    }

    /// Build the shared index from `seeds` unless something is already there.
    pub async fn bootstrap_shared(&self, seeds: &[Document], label: &str) -> Result<BootstrapOutcome> {
        let shared = self.layout().shared_dir.clone();
        let _guard = self.locks().lock(&shared).await;

        if disk::has_artifacts(&shared) {
            tracing::info!(location = %shared.display(), "shared index already present, skipping bootstrap");
            return Ok(BootstrapOutcome::AlreadyPresent);
        }

        let text = seed_text(seeds);
        let chunks: Vec<Chunk> = self
            .chunker()
            .split(&text)
            .into_iter()
            .map(|t| Chunk::new(t, label))
            .collect();
        let index = VectorIndex::build(self.embedder(), chunks)
            .await?
            .save_async(shared, self.options().retain_versions)
            .await?;
        let version = index.version();

        tracing::info!(seeds = seeds.len(), chunks = index.len(), version, "shared index bootstrapped");
        Ok(BootstrapOutcome::Built {
            chunks: index.len(),
            version,
        })
    }
}

/// Bootstrap from seed files on disk. Extraction is skipped entirely when
/// the shared index is already present.
pub async fn bootstrap_from_paths(
    manager: &IndexManager,
    extractor: &dyn TextExtractor,
    paths: &[PathBuf],
    label: &str,
) -> Result<BootstrapOutcome> {
    if manager.shared_present() {
        tracing::info!("shared index already present, skipping seed extraction");
        return Ok(BootstrapOutcome::AlreadyPresent);
    }
    let seeds = load_seed_documents(extractor, paths)?;
    manager.bootstrap_shared(&seeds, label).await
}

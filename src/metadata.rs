//! Descriptive per-document index records.
//!
//! One record is upserted each time a per-document index is built. The
//! records are audit data only; search never consults them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub page_count: usize,
    pub word_count: usize,
    pub chunk_count: usize,
    pub preview: String,
    pub index_path: PathBuf,
    pub uploaded_by: String,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or replace the record for `record.name`.
    async fn upsert(&self, record: IndexRecord) -> Result<()>;
    async fn get(&self, name: &str) -> Result<Option<IndexRecord>>;
}

/// Records kept in memory, for tests and embedding callers.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<BTreeMap<String, IndexRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn upsert(&self, record: IndexRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.name.clone(), record);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<IndexRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(name).cloned())
    }
}

/// All records in one JSON object keyed by name, rewritten via temp file
/// and rename on every upsert.
pub struct JsonMetadataStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, IndexRecord>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Store(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn write_all(&self, records: &BTreeMap<String, IndexRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(records).map_err(|e| Error::Store(e.to_string()))?;
        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, json).map_err(|e| Error::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| Error::io(&self.path, e))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn upsert(&self, record: IndexRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all()?;
        records.insert(record.name.clone(), record);
        self.write_all(&records)
    }

    async fn get(&self, name: &str) -> Result<Option<IndexRecord>> {
        Ok(self.read_all()?.remove(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, chunks: usize) -> IndexRecord {
        IndexRecord {
            name: name.to_string(),
            created_at: Utc::now(),
            page_count: 2,
            word_count: 10,
            chunk_count: chunks,
            preview: "preview".to_string(),
            index_path: PathBuf::from(format!("faiss_indexes/{}_index", name)),
            uploaded_by: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_json_store_upsert_replaces() {
        let tmp = TempDir::new().unwrap();
        let store = JsonMetadataStore::new(tmp.path().join("meta/pdf_metadata.json"));
        assert!(store.get("doc1").await.unwrap().is_none());

        store.upsert(record("doc1", 1)).await.unwrap();
        store.upsert(record("doc2", 5)).await.unwrap();
        store.upsert(record("doc1", 3)).await.unwrap();

        assert_eq!(store.get("doc1").await.unwrap().unwrap().chunk_count, 3);
        assert_eq!(store.get("doc2").await.unwrap().unwrap().chunk_count, 5);
    }

    #[tokio::test]
    async fn test_json_store_malformed_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("meta.json");
        std::fs::write(&path, "[oops").unwrap();
        let store = JsonMetadataStore::new(&path);
        assert!(matches!(store.get("x").await, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryMetadataStore::new();
        let rec = record("doc1", 2);
        store.upsert(rec.clone()).await.unwrap();
        assert_eq!(store.get("doc1").await.unwrap(), Some(rec));
        assert!(store.get("doc2").await.unwrap().is_none());
    }
}

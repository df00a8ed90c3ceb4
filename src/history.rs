//! Question/answer history.
//!
//! An append-only sink keyed by index name. The retrieval pipeline writes
//! one record per answered question; reports read them back in
//! chronological order.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    /// Document name, or the shared key for the domain index.
    pub document: String,
    pub question: String,
    pub answer: String,
    pub mode: String,
    pub language: String,
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: QaRecord) -> Result<()>;
    /// Records for `document`, oldest first.
    async fn for_document(&self, document: &str) -> Result<Vec<QaRecord>>;
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<QaRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: QaRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }

    async fn for_document(&self, document: &str) -> Result<Vec<QaRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<QaRecord> = records
            .iter()
            .filter(|r| r.document == document)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.timestamp);
        Ok(out)
    }
}

/// One JSON object per line, appended.
pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn append(&self, record: QaRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record).map_err(|e| Error::Store(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| Error::io(&self.path, e))
    }

    async fn for_document(&self, document: &str) -> Result<Vec<QaRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        let mut out = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: QaRecord = serde_json::from_str(line).map_err(|e| {
                Error::Store(format!("{}:{}: {}", self.path.display(), n + 1, e))
            })?;
            if record.document == document {
                out.push(record);
            }
        }
        out.sort_by_key(|r| r.timestamp);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn record(document: &str, question: &str, offset_secs: i64) -> QaRecord {
        QaRecord {
            document: document.to_string(),
            question: question.to_string(),
            answer: "answer".to_string(),
            mode: "professional".to_string(),
            language: "English".to_string(),
            sources: vec![document.to_string()],
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn test_jsonl_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlHistoryStore::new(tmp.path().join("logs/chat_history.jsonl"));
        store.append(record("doc1", "second", 20)).await.unwrap();
        store.append(record("doc2", "other", 5)).await.unwrap();
        store.append(record("doc1", "first", 10)).await.unwrap();

        let got = store.for_document("doc1").await.unwrap();
        let questions: Vec<&str> = got.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["first", "second"]);
        assert!(store.for_document("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlHistoryStore::new(tmp.path().join("none.jsonl"));
        assert!(store.for_document("doc1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_sorted() {
        let store = MemoryHistoryStore::new();
        store.append(record("doc1", "late", 9)).await.unwrap();
        store.append(record("doc1", "early", 1)).await.unwrap();
        assert_eq!(store.len(), 2);
        let got = store.for_document("doc1").await.unwrap();
        assert_eq!(got[0].question, "early");
    }
}

//! Core data models shared by the indexing and retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of characters kept in a document preview.
const PREVIEW_CHARS: usize = 300;

/// An uploaded or preloaded PDF after text extraction.
///
/// `name` is the collision key: two uploads with the same name target the
/// same per-document index.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    /// Extracted text, one entry per page (empty for pages without text).
    pub pages: Vec<String>,
}

impl Document {
    pub fn from_pages(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            pages,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Full text: each page with text followed by a newline.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            if !page.is_empty() {
                out.push_str(page);
                out.push('\n');
            }
        }
        out
    }

    /// Byte offset in [`Document::text`] where each non-empty page starts,
    /// paired with its 1-based page number.
    pub fn page_offsets(&self) -> Vec<(usize, u32)> {
        let mut offsets = Vec::new();
        let mut pos = 0;
        for (i, page) in self.pages.iter().enumerate() {
            if !page.is_empty() {
                offsets.push((pos, i as u32 + 1));
                pos += page.len() + 1;
            }
        }
        offsets
    }

    pub fn word_count(&self) -> usize {
        self.pages.iter().map(|p| p.split_whitespace().count()).sum()
    }

    pub fn preview(&self) -> String {
        preview_of(&self.text())
    }
}

/// First 300 characters of `text`, with `...` appended when truncated.
pub fn preview_of(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// A bounded text segment plus its source attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Source label: the document name, or the shared label for seed content.
    pub source: String,
    /// Page the chunk starts on, when known. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            page: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Which index an operation addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexTarget {
    /// The shared/domain index.
    Shared,
    /// The per-document index keyed by document name.
    Document(String),
}

impl IndexTarget {
    /// Key used for history records.
    pub fn key(&self) -> &str {
        match self {
            IndexTarget::Shared => SHARED_KEY,
            IndexTarget::Document(name) => name,
        }
    }
}

/// History key for questions asked against the shared index.
pub const SHARED_KEY: &str = "marine";

/// Reject names that could escape the index root, collide with its layout,
/// or share history with the shared index.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name == SHARED_KEY
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.starts_with('.');
    if bad {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_text_skips_empty_pages() {
        let doc = Document::from_pages(
            "doc1",
            vec!["one two".into(), String::new(), "three".into()],
        );
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.text(), "one two\nthree\n");
        assert_eq!(doc.word_count(), 3);
        assert_eq!(doc.page_offsets(), vec![(0, 1), (8, 3)]);
    }

    #[test]
    fn test_preview_truncates() {
        let long = "a".repeat(301);
        let p = preview_of(&long);
        assert_eq!(p.len(), 303);
        assert!(p.ends_with("..."));
        assert_eq!(preview_of("short"), "short");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("MARPOL Annex VI.pdf").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name(SHARED_KEY).is_err());
        assert!(validate_name("marine.pdf").is_ok());
    }

    #[test]
    fn test_target_key() {
        assert_eq!(IndexTarget::Shared.key(), SHARED_KEY);
        assert_eq!(IndexTarget::Document("doc1".into()).key(), "doc1");
    }
}

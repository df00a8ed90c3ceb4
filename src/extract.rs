//! PDF text extraction.
//!
//! Extraction sits in front of the chunker: callers supply PDF bytes and
//! get back per-page UTF-8 text. Failures are returned, never panicked on,
//! so a bad upload fails only its own ingest.

use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Document;

/// Text pulled from one PDF, one entry per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub pages: Vec<String>,
}

impl ExtractedText {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Converts document bytes to per-page text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText>;
}

/// [`TextExtractor`] backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| Error::Extraction(e.to_string()))?;
        Ok(ExtractedText { pages })
    }
}

/// Build a [`Document`] named `name` from raw bytes.
pub fn document_from_bytes(
    extractor: &dyn TextExtractor,
    name: &str,
    bytes: &[u8],
) -> Result<Document> {
    let extracted = extractor.extract(bytes)?;
    Ok(Document::from_pages(name, extracted.pages))
}

/// Read and extract a file; the document is named after the file name.
pub fn document_from_path(extractor: &dyn TextExtractor, path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidName(path.display().to_string()))?;
    document_from_bytes(extractor, &name, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedExtractor;

    impl TextExtractor for FixedExtractor {
        fn extract(&self, bytes: &[u8]) -> Result<ExtractedText> {
            let text = String::from_utf8_lossy(bytes);
            Ok(ExtractedText {
                pages: text.split('\u{c}').map(str::to_string).collect(),
            })
        }
    }

    #[test]
    fn test_document_from_bytes_keeps_pages() {
        let doc = document_from_bytes(&FixedExtractor, "doc1", b"page one\x0cpage two").unwrap();
        assert_eq!(doc.name, "doc1");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.word_count(), 4);
    }

    #[test]
    fn test_pdf_extractor_rejects_garbage() {
        let err = PdfExtractor.extract(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_document_from_missing_path() {
        let err = document_from_path(&FixedExtractor, Path::new("/nonexistent/x.pdf")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}

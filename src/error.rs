//! Error taxonomy for the indexing and retrieval core.
//!
//! Every library operation returns [`Result`]. The binary wraps these in
//! `anyhow` for reporting; library callers can match on the variant to
//! tell a missing index apart from a corrupt one.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Chunker parameters were rejected (e.g. overlap not smaller than max size).
    #[error("chunking failed: {0}")]
    Chunking(String),

    /// Embedding collaborator failed or returned inconsistent vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The location holds no index.
    #[error("no index found at {}", .0.display())]
    IndexNotFound(PathBuf),

    /// The location holds index data that cannot be read back.
    #[error("index at {} is corrupt: {reason}", .location.display())]
    IndexCorrupt { location: PathBuf, reason: String },

    /// Two indexes cannot be merged (different model or dimensionality).
    #[error("cannot merge indexes: {0}")]
    Merge(String),

    #[error("invalid document name '{0}'")]
    InvalidName(String),

    /// An index already exists and the configured policy forbids overwriting it.
    #[error("an index for '{0}' already exists")]
    IndexExists(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("generation failed: {0}")]
    Generation(String),

    /// History or metadata collaborator failure.
    #[error("record store error: {0}")]
    Store(String),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(location: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// True for [`Error::IndexNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::IndexNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_names_location() {
        let err = Error::IndexNotFound(PathBuf::from("faiss_indexes/doc1_index"));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no index found at faiss_indexes/doc1_index");
    }

    #[test]
    fn test_corrupt_display() {
        let err = Error::corrupt("idx", "checksum mismatch");
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "index at idx is corrupt: checksum mismatch");
    }
}

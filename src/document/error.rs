//! Document error types
//!
//! Unified error handling for the store, renderer, cache and coordinator.

use std::path::PathBuf;

use thiserror::Error;

/// Unified document error type
#[derive(Debug, Error)]
pub enum DocumentError {
    /// No matching file for an id/format
    #[error("Document not found: {0}")]
    NotFound(String),

    /// File exists but fails PDF/image structural validation
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Page index outside the renderer-reported page count
    #[error("Page {index} out of range (document has {page_count} pages)")]
    PageOutOfRange { index: usize, page_count: usize },

    /// IO error (std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error tied to a specific file
    #[error("IO error on {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some but not all backing files were removed
    #[error("Partial delete of {id}: removed {} file(s), {} failed", removed.len(), failed.len())]
    PartialDelete {
        id: String,
        removed: Vec<PathBuf>,
        failed: Vec<(PathBuf, String)>,
    },

    /// Operation superseded by a newer request for the same target
    #[error("Operation cancelled")]
    Cancelled,

    /// Format not recognized
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    /// Rasterization failed
    #[error("Render error: {0}")]
    Render(String),

    /// MuPDF engine error
    #[error("MuPDF error: {0}")]
    Engine(String),

    /// Image decoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Timeout error
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Id already used by a stored or retired document
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// Sidecar metadata could not be read or written
    #[error("Metadata error: {0}")]
    Metadata(String),
}

/// Classification of a [`DocumentError`] for user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidResource,
    OutOfRange,
    IoFailure,
    PartialDeleteFailure,
    Cancelled,
    Unsupported,
    Timeout,
    AlreadyExists,
}

impl DocumentError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocumentError::NotFound(_) => ErrorKind::NotFound,
            DocumentError::InvalidResource(_)
            | DocumentError::Render(_)
            | DocumentError::Engine(_)
            | DocumentError::Image(_) => ErrorKind::InvalidResource,
            DocumentError::PageOutOfRange { .. } => ErrorKind::OutOfRange,
            DocumentError::Io(_) | DocumentError::IoAt { .. } | DocumentError::Metadata(_) => {
                ErrorKind::IoFailure
            }
            DocumentError::PartialDelete { .. } => ErrorKind::PartialDeleteFailure,
            DocumentError::Cancelled => ErrorKind::Cancelled,
            DocumentError::Unsupported(_) => ErrorKind::Unsupported,
            DocumentError::Timeout(_) => ErrorKind::Timeout,
            DocumentError::AlreadyExists(_) => ErrorKind::AlreadyExists,
        }
    }

    pub(crate) fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DocumentError::IoAt {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Alias for Result
pub type DocumentResult<T> = Result<T>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::Engine(err.to_string())
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(err: serde_json::Error) -> Self {
        DocumentError::Metadata(err.to_string())
    }
}

impl From<image::ImageError> for DocumentError {
    fn from(err: image::ImageError) -> Self {
        DocumentError::Image(err.to_string())
    }
}

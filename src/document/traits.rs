//! Document traits
//!
//! Seams between the store, the rendering engine and the load coordinator.

use std::path::PathBuf;

use async_trait::async_trait;

use super::error::Result;
use super::types::{Document, DocumentFormat, DocumentSource, Page, PdfMetadata, PixelBuffer};

/// Stateless PDF adapter
///
/// Every method opens the resource, does its work and releases all engine
/// handles before returning. Methods block; async callers run them on the
/// blocking pool.
pub trait PageRenderer: Send + Sync {
    /// Whether the resource opens as a PDF
    fn is_valid_pdf(&self, source: &DocumentSource) -> bool;

    /// Renderer-reported page count
    fn page_count(&self, source: &DocumentSource) -> Result<usize>;

    /// One page record per PDF page, empty on any failure
    fn extract_pages(&self, source: &DocumentSource) -> Vec<Page>;

    /// Rasterize one page
    ///
    /// Pages render at native size unless `max_dimension` bounds them.
    fn render_page(
        &self,
        source: &DocumentSource,
        page_index: usize,
        max_dimension: Option<u32>,
    ) -> Result<PixelBuffer>;

    /// Page count, byte size and best-effort descriptive fields
    fn get_metadata(&self, source: &DocumentSource) -> Option<PdfMetadata>;
}

/// Result of a successful delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: String,
    /// Files removed by this call; empty when nothing matched
    pub removed: Vec<PathBuf>,
}

impl DeleteOutcome {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Async view of a document store
///
/// Implementations must not block the calling task.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Scan for every non-deleted document of `format`
    async fn list_documents(&self, format: DocumentFormat) -> Result<Vec<Document>>;

    /// Resolve one document by id and format
    async fn get_document(&self, id: &str, format: DocumentFormat) -> Result<Option<Document>>;

    /// Resolve only the pages of a document
    async fn get_pages(&self, id: &str, format: DocumentFormat) -> Result<Vec<Page>>;

    /// Remove every backing file of `id`, then soft-delete it
    async fn delete_document(&self, id: &str) -> Result<DeleteOutcome>;

    /// Persist caller-editable fields
    async fn save_document(&self, document: &Document) -> Result<()>;

    /// Whether `id` has been soft-deleted
    fn is_deleted(&self, id: &str) -> bool;
}

//! Format-specific rendering
//!
//! - [`pdf`]: [`MupdfRenderer`], the [`PageRenderer`] for PDF resources
//! - [`image`]: decoding of single-page image documents
//!
//! [`rasterize`] dispatches a page locator to the right one.

pub mod image;
pub mod pdf;

pub use pdf::MupdfRenderer;

use crate::document::{
    DocumentError, DocumentResult, DocumentSource, FileKind, PageLocator, PageRenderer,
    PixelBuffer,
};

/// Materialize the pixels a page locator points at
pub fn rasterize(
    renderer: &dyn PageRenderer,
    locator: &PageLocator,
    max_dimension: Option<u32>,
) -> DocumentResult<PixelBuffer> {
    let source = DocumentSource::from_path(&locator.path);

    match (FileKind::from_path(&locator.path), locator.page) {
        (FileKind::Pdf, Some(index)) => renderer.render_page(&source, index, max_dimension),
        (FileKind::Pdf, None) => renderer.render_page(&source, 0, max_dimension),
        (FileKind::Image(_), None) => image::decode(&source, max_dimension),
        (FileKind::Image(_), Some(index)) => Err(DocumentError::InvalidResource(format!(
            "image locator {} cannot address page {}",
            locator.path.display(),
            index
        ))),
        (FileKind::Unsupported, _) => Err(DocumentError::Unsupported(
            locator.path.display().to_string(),
        )),
    }
}

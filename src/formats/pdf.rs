//! PDF PageRenderer implementation
//!
//! Implements [`PageRenderer`] with MuPDF. Every call opens the resource
//! through [`SafeDocument`], so no engine handle survives a call.

use mupdf::{Colorspace, Matrix, MetadataName};

use crate::document::{
    DocumentError, DocumentResult, DocumentSource, Page, PageRenderer, PdfMetadata, PixelBuffer,
};
use crate::mupdf::SafeDocument;

/// MuPDF-backed page renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct MupdfRenderer;

impl MupdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRenderer for MupdfRenderer {
    fn is_valid_pdf(&self, source: &DocumentSource) -> bool {
        match SafeDocument::open(source) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(resource = %source.uri(), error = %e, "Not a valid PDF");
                false
            }
        }
    }

    fn page_count(&self, source: &DocumentSource) -> DocumentResult<usize> {
        Ok(SafeDocument::open(source)?.page_count())
    }

    fn extract_pages(&self, source: &DocumentSource) -> Vec<Page> {
        match SafeDocument::open(source) {
            Ok(doc) => {
                let resource = source.uri();
                (0..doc.page_count())
                    .map(|index| Page::pdf(&resource, index))
                    .collect()
            }
            Err(e) => {
                tracing::warn!(resource = %source.uri(), error = %e, "Failed to extract PDF pages");
                Vec::new()
            }
        }
    }

    fn render_page(
        &self,
        source: &DocumentSource,
        page_index: usize,
        max_dimension: Option<u32>,
    ) -> DocumentResult<PixelBuffer> {
        let doc = SafeDocument::open(source)?;

        doc.with_page(page_index, |page| {
            let bounds = page.bounds()?;
            let width = bounds.x1 - bounds.x0;
            let height = bounds.y1 - bounds.y0;
            if width <= 0.0 || height <= 0.0 {
                return Err(DocumentError::InvalidResource(format!(
                    "page {} of {} has an empty media box",
                    page_index,
                    source.uri()
                )));
            }

            let scale = fit_scale(width, height, max_dimension);
            let matrix = Matrix::new_scale(scale, scale);
            let colorspace = Colorspace::device_rgb();
            let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;

            pixmap_to_buffer(&pixmap)
        })
    }

    fn get_metadata(&self, source: &DocumentSource) -> Option<PdfMetadata> {
        let doc = match SafeDocument::open(source) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!(resource = %source.uri(), error = %e, "No metadata for resource");
                return None;
            }
        };

        let byte_size = doc.byte_size().ok()?;
        let page_count = doc.page_count();

        doc.with_doc(|mupdf_doc| {
            let get_meta = |name: MetadataName| -> Option<String> {
                mupdf_doc
                    .metadata(name)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            };

            Ok(PdfMetadata {
                page_count,
                byte_size,
                title: get_meta(MetadataName::Title),
                author: get_meta(MetadataName::Author),
                creation_date: get_meta(MetadataName::CreationDate),
                password_protected: mupdf_doc.needs_password().ok(),
            })
        })
        .ok()
    }
}

/// Scale that keeps both dimensions within `max_dimension`, never enlarging
fn fit_scale(width: f32, height: f32, max_dimension: Option<u32>) -> f32 {
    match max_dimension {
        Some(max) if max > 0 => (max as f32 / width.max(height)).min(1.0),
        _ => 1.0,
    }
}

/// Copy a pixmap into an RGBA buffer
fn pixmap_to_buffer(pixmap: &mupdf::Pixmap) -> DocumentResult<PixelBuffer> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    if n < 3 {
        return Err(DocumentError::Render(format!(
            "unexpected pixmap with {} components",
            n
        )));
    }

    let mut rgba_buffer = Vec::with_capacity(width as usize * height as usize * 4);

    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba_buffer.extend_from_slice(&[r, g, b, a]);
        }
    }

    PixelBuffer::new(width, height, crate::document::PixelFormat::Rgba8, rgba_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_scale_never_enlarges() {
        assert_eq!(fit_scale(200.0, 100.0, None), 1.0);
        assert_eq!(fit_scale(200.0, 100.0, Some(400)), 1.0);
        assert_eq!(fit_scale(200.0, 100.0, Some(50)), 0.25);
        assert_eq!(fit_scale(100.0, 400.0, Some(100)), 0.25);
        assert_eq!(fit_scale(100.0, 400.0, Some(0)), 1.0);
    }

    #[test]
    fn test_garbage_bytes_are_not_a_pdf() {
        let renderer = MupdfRenderer::new();
        let source = DocumentSource::from_bytes("junk.pdf", b"definitely not a pdf".to_vec());

        assert!(!renderer.is_valid_pdf(&source));
        assert!(renderer.extract_pages(&source).is_empty());
        assert!(renderer.get_metadata(&source).is_none());
        assert!(renderer.render_page(&source, 0, None).is_err());
    }
}

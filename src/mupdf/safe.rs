//! Scoped document access for MuPDF
//!
//! MuPDF documents and pages are not `Send`, so nothing here keeps one
//! alive between calls. A [`SafeDocument`] remembers only where the PDF
//! lives and its page count; every operation opens a fresh engine document
//! inside a closure and drops it (and any page loaded from it) before
//! returning, on the error path as well.

use std::fs::File;
use std::io::Read;

use mupdf::{Document, Page};

use crate::document::{DocumentError, DocumentResult, DocumentSource};

/// Bytes searched for the `%PDF-` header
const HEADER_WINDOW: usize = 1024;

const PDF_MIME: &str = "application/pdf";

/// Handle to a validated PDF resource
pub struct SafeDocument {
    source: DocumentSource,
    page_count: usize,
}

impl SafeDocument {
    /// Validate the header, open the document once and record its page count
    pub fn open(source: &DocumentSource) -> DocumentResult<Self> {
        if !has_pdf_header(source)? {
            return Err(DocumentError::InvalidResource(format!(
                "{} has no PDF header",
                source.uri()
            )));
        }

        let page_count = with_engine_document(source, |doc| Ok(doc.page_count()?))?;
        let page_count = usize::try_from(page_count).map_err(|_| {
            DocumentError::InvalidResource(format!("{} reports a negative page count", source.uri()))
        })?;

        Ok(Self {
            source: source.clone(),
            page_count,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Execute a closure with a freshly opened engine document
    pub fn with_doc<F, R>(&self, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&Document) -> DocumentResult<R>,
    {
        with_engine_document(&self.source, f)
    }

    /// Execute a closure with one page, after checking the index
    pub fn with_page<F, R>(&self, index: usize, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&Page) -> DocumentResult<R>,
    {
        if index >= self.page_count {
            return Err(DocumentError::PageOutOfRange {
                index,
                page_count: self.page_count,
            });
        }

        let page_number = i32::try_from(index).map_err(|_| DocumentError::PageOutOfRange {
            index,
            page_count: self.page_count,
        })?;

        self.with_doc(|doc| {
            let page = doc.load_page(page_number)?;
            f(&page)
        })
    }

    /// Size of the underlying resource in bytes
    pub fn byte_size(&self) -> DocumentResult<u64> {
        match &self.source {
            DocumentSource::Path(path) => std::fs::metadata(path)
                .map(|meta| meta.len())
                .map_err(|e| DocumentError::io_at(path, e)),
            DocumentSource::Bytes { data, .. } => Ok(data.len() as u64),
        }
    }
}

fn with_engine_document<F, R>(source: &DocumentSource, f: F) -> DocumentResult<R>
where
    F: FnOnce(&Document) -> DocumentResult<R>,
{
    let doc = match source {
        DocumentSource::Path(path) => {
            let path_str = path.to_string_lossy();
            Document::open(&*path_str)?
        }
        DocumentSource::Bytes { data, .. } => Document::from_bytes(data, PDF_MIME)?,
    };

    f(&doc)
}

/// Whether the first bytes of the resource carry a PDF header
pub fn has_pdf_header(source: &DocumentSource) -> DocumentResult<bool> {
    let head = match source {
        DocumentSource::Path(path) => {
            let mut file = File::open(path).map_err(|e| DocumentError::io_at(path, e))?;
            let mut head = Vec::with_capacity(HEADER_WINDOW);
            file.by_ref()
                .take(HEADER_WINDOW as u64)
                .read_to_end(&mut head)
                .map_err(|e| DocumentError::io_at(path, e))?;
            head
        }
        DocumentSource::Bytes { data, .. } => data[..data.len().min(HEADER_WINDOW)].to_vec(),
    };

    Ok(head.windows(5).any(|window| window == b"%PDF-"))
}

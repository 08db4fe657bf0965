//! File-backed document store
//!
//! One flat directory holds every document. A document's id is the base
//! name of its backing file, its format is the file extension, and its
//! pages are either the file itself (images) or every page of the PDF.
//!
//! Reads always go to the file system; nothing is cached here. Ids that
//! have been deleted through the store are recorded in a [`DeletedIdSet`]
//! and hidden from every later read.

pub mod scanner;
pub mod sidecar;
pub mod tombstones;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use crate::document::{
    DeleteOutcome, Document, DocumentError, DocumentFormat, DocumentRepository, DocumentResult,
    DocumentSource, FileKind, Page, PageRenderer, PdfMetadata,
};
use crate::formats;

use scanner::Candidate;
use sidecar::SidecarMetadata;

pub use tombstones::{DeletedIdSet, InMemoryDeletedIds, MarkerFileDeletedIds};

/// Directory (inside the root) holding persistent deletion markers
pub const DELETED_DIR: &str = ".deleted";

// ============================================================================
// File Document Store
// ============================================================================

/// Document store over one directory
///
/// Cheap to clone; clones share the root, renderer and deleted-id set.
#[derive(Clone)]
pub struct FileDocumentStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    root: PathBuf,
    renderer: Arc<dyn PageRenderer>,
    deleted: Arc<dyn DeletedIdSet>,
    remove_file: fn(&Path) -> io::Result<()>,
}

impl FileDocumentStore {
    /// Open a store whose deletions last for the process lifetime
    pub fn open<P: AsRef<Path>>(root: P, renderer: Arc<dyn PageRenderer>) -> DocumentResult<Self> {
        Self::with_deleted_ids(root, renderer, Arc::new(InMemoryDeletedIds::new()))
    }

    /// Open a store that persists deletions as marker files under `.deleted/`
    pub fn open_persistent<P: AsRef<Path>>(
        root: P,
        renderer: Arc<dyn PageRenderer>,
    ) -> DocumentResult<Self> {
        let root = prepare_root(root.as_ref())?;
        let deleted = MarkerFileDeletedIds::open(root.join(DELETED_DIR))?;
        Self::with_deleted_ids(root, renderer, Arc::new(deleted))
    }

    /// Open a store with a caller-supplied deleted-id set
    pub fn with_deleted_ids<P: AsRef<Path>>(
        root: P,
        renderer: Arc<dyn PageRenderer>,
        deleted: Arc<dyn DeletedIdSet>,
    ) -> DocumentResult<Self> {
        let root = prepare_root(root.as_ref())?;

        tracing::info!(
            root = %root.display(),
            deleted = deleted.len(),
            "Opened document store"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                root,
                renderer,
                deleted,
                remove_file,
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn renderer(&self) -> Arc<dyn PageRenderer> {
        Arc::clone(&self.inner.renderer)
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.inner.deleted.ids()
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        self.inner.deleted.contains(id)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Every non-deleted document of `format`
    ///
    /// Each id is backed by exactly one file: the first candidate in claim
    /// order (PDFs, then images, each by file name) that yields pages. An id
    /// claimed by a file of another format is not listed here.
    pub fn scan(&self, format: DocumentFormat) -> DocumentResult<Vec<Document>> {
        let started = Instant::now();
        let candidates = scanner::candidates(self.root())?;
        let wanted: HashSet<&str> = candidates
            .iter()
            .filter(|candidate| candidate.matches(format))
            .map(|candidate| candidate.id.as_str())
            .collect();

        let mut claimed = HashSet::new();
        let mut documents = Vec::new();

        for candidate in &candidates {
            if !wanted.contains(candidate.id.as_str())
                || claimed.contains(&candidate.id)
                || self.is_deleted(&candidate.id)
            {
                continue;
            }

            if candidate.matches(format) {
                if let Some(document) = self.build_document(candidate) {
                    claimed.insert(candidate.id.clone());
                    documents.push(document);
                }
            } else if self.yields_pages(candidate) {
                tracing::debug!(
                    path = %candidate.path.display(),
                    id = %candidate.id,
                    "Id backed by another format"
                );
                claimed.insert(candidate.id.clone());
            }
        }

        tracing::info!(
            format = %format,
            count = documents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Document scan complete"
        );

        Ok(documents)
    }

    /// Resolve one document, `None` when deleted, absent or backed by another format
    pub fn resolve(&self, id: &str, format: DocumentFormat) -> DocumentResult<Option<Document>> {
        if self.is_deleted(id) {
            return Ok(None);
        }

        for candidate in scanner::candidates(self.root())? {
            if candidate.id != id {
                continue;
            }
            if candidate.matches(format) {
                if let Some(document) = self.build_document(&candidate) {
                    return Ok(Some(document));
                }
            } else if self.yields_pages(&candidate) {
                return Ok(None);
            }
        }

        Ok(None)
    }

    /// Pages of one document, empty when deleted or absent
    pub fn resolve_pages(&self, id: &str, format: DocumentFormat) -> DocumentResult<Vec<Page>> {
        Ok(self
            .resolve(id, format)?
            .map(|document| document.pages)
            .unwrap_or_default())
    }

    /// PDF metadata for a stored PDF document
    pub fn metadata(&self, id: &str) -> DocumentResult<PdfMetadata> {
        let document = self
            .resolve(id, DocumentFormat::Pdf)?
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;
        let path = document
            .pages
            .first()
            .map(|page| page.locator().path)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;

        self.inner
            .renderer
            .get_metadata(&DocumentSource::Path(path))
            .ok_or_else(|| DocumentError::InvalidResource(format!("no metadata for {}", id)))
    }

    fn yields_pages(&self, candidate: &Candidate) -> bool {
        match candidate.kind {
            FileKind::Pdf => self
                .inner
                .renderer
                .page_count(&DocumentSource::from_path(&candidate.path))
                .map(|count| count > 0)
                .unwrap_or(false),
            FileKind::Image(_) => true,
            FileKind::Unsupported => false,
        }
    }

    fn build_document(&self, candidate: &Candidate) -> Option<Document> {
        let pages = match candidate.kind {
            FileKind::Pdf => self
                .inner
                .renderer
                .extract_pages(&DocumentSource::from_path(&candidate.path)),
            FileKind::Image(_) => vec![Page::image(&candidate.path)],
            FileKind::Unsupported => return None,
        };

        if pages.is_empty() {
            tracing::debug!(path = %candidate.path.display(), "No pages, skipping");
            return None;
        }

        let format = candidate.kind.format()?;
        let mut document = Document {
            id: candidate.id.clone(),
            title: candidate.id.clone(),
            created_at: candidate.modified,
            format,
            tags: Vec::new(),
            score: 0,
            thumbnail: pages[0].image_uri.clone(),
            pages,
        };

        match sidecar::read(self.root(), &candidate.id) {
            Ok(Some(metadata)) => metadata.apply(&mut document),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(id = %candidate.id, error = %e, "Ignoring unreadable sidecar");
            }
        }

        Some(document)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Remove every backing file of `id`
    ///
    /// Only a fully successful removal records the id as deleted. A call
    /// with no matching files is a no-op.
    pub fn remove(&self, id: &str) -> DocumentResult<DeleteOutcome> {
        let matching: Vec<PathBuf> = scanner::visible_files(self.root())?
            .into_iter()
            .filter(|path| scanner::base_name(path).as_deref() == Some(id))
            .collect();

        if matching.is_empty() {
            tracing::debug!(id = %id, "Nothing to delete");
            return Ok(DeleteOutcome {
                id: id.to_string(),
                removed: Vec::new(),
            });
        }

        let mut removed = Vec::new();
        let mut failed: Vec<(PathBuf, io::Error)> = Vec::new();
        for path in matching {
            match (self.inner.remove_file)(&path) {
                Ok(()) => removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => removed.push(path),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
                    failed.push((path, e));
                }
            }
        }

        if failed.is_empty() {
            self.inner.deleted.insert(id)?;
            if let Err(e) = sidecar::remove(self.root(), id) {
                tracing::warn!(id = %id, error = %e, "Failed to remove sidecar");
            }

            tracing::info!(id = %id, files = removed.len(), "Deleted document");
            return Ok(DeleteOutcome {
                id: id.to_string(),
                removed,
            });
        }

        if removed.is_empty() {
            let (path, source) = failed.remove(0);
            return Err(DocumentError::io_at(path, source));
        }

        Err(DocumentError::PartialDelete {
            id: id.to_string(),
            removed,
            failed: failed
                .into_iter()
                .map(|(path, e)| (path, e.to_string()))
                .collect(),
        })
    }

    /// Persist the caller-editable fields of an existing document
    pub fn save(&self, document: &Document) -> DocumentResult<()> {
        if self.resolve(&document.id, document.format)?.is_none() {
            return Err(DocumentError::NotFound(document.id.clone()));
        }

        sidecar::write(
            self.root(),
            &document.id,
            &SidecarMetadata::from_document(document),
        )?;

        tracing::debug!(id = %document.id, "Saved document metadata");
        Ok(())
    }

    /// Copy a file into the store
    ///
    /// The id defaults to a fresh UUID; the format comes from the source
    /// file's extension.
    pub fn import_file(&self, source: &Path, id: Option<&str>) -> DocumentResult<Document> {
        let format = FileKind::from_path(source)
            .format()
            .ok_or_else(|| DocumentError::Unsupported(source.display().to_string()))?;

        self.validate_import(&DocumentSource::from_path(source), format)?;
        self.commit(format, id, |tmp| {
            fs::copy(source, tmp).map(|_| ()).map_err(|e| DocumentError::io_at(source, e))
        })
    }

    /// Write in-memory bytes into the store
    ///
    /// The format comes from `name`'s extension, falling back to the
    /// content's magic bytes.
    pub fn import_bytes(
        &self,
        name: &str,
        bytes: Vec<u8>,
        id: Option<&str>,
    ) -> DocumentResult<Document> {
        let format = FileKind::from_path(Path::new(name))
            .format()
            .or_else(|| DocumentFormat::from_magic_bytes(&bytes))
            .ok_or_else(|| DocumentError::Unsupported(name.to_string()))?;

        let source = DocumentSource::from_bytes(name, bytes);
        self.validate_import(&source, format)?;

        let DocumentSource::Bytes { data, .. } = source else {
            return Err(DocumentError::Unsupported(name.to_string()));
        };
        self.commit(format, id, |tmp| {
            fs::write(tmp, data.as_slice()).map_err(|e| DocumentError::io_at(tmp, e))
        })
    }

    fn validate_import(&self, source: &DocumentSource, format: DocumentFormat) -> DocumentResult<()> {
        if format.is_pdf() {
            if !self.inner.renderer.is_valid_pdf(source) {
                return Err(DocumentError::InvalidResource(format!(
                    "{} is not a valid PDF",
                    source.uri()
                )));
            }
            return Ok(());
        }

        formats::image::probe(source).map(|_| ()).map_err(|e| match e {
            DocumentError::Image(message) => DocumentError::InvalidResource(message),
            other => other,
        })
    }

    /// Reserve an id, write through a temp file and rename into place
    fn commit<F>(&self, format: DocumentFormat, id: Option<&str>, write: F) -> DocumentResult<Document>
    where
        F: FnOnce(&Path) -> DocumentResult<()>,
    {
        let id = match id {
            Some(id) => validate_id(id)?.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        if self.is_deleted(&id) {
            return Err(DocumentError::AlreadyExists(id));
        }
        let taken = scanner::visible_files(self.root())?
            .iter()
            .any(|path| scanner::base_name(path).as_deref() == Some(id.as_str()));
        if taken {
            return Err(DocumentError::AlreadyExists(id));
        }

        let tmp = self
            .root()
            .join(format!("{}-{}.{}", scanner::TEMP_PREFIX, Uuid::new_v4(), format));
        let target = self.root().join(format!("{}.{}", id, format));

        if let Err(e) = write(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(DocumentError::io_at(target, e));
        }

        tracing::info!(id = %id, format = %format, path = %target.display(), "Imported document");

        self.resolve(&id, format)?.ok_or_else(|| {
            DocumentError::InvalidResource(format!("imported {} has no pages", id))
        })
    }
}

fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

fn prepare_root(root: &Path) -> DocumentResult<PathBuf> {
    fs::create_dir_all(root).map_err(|e| DocumentError::io_at(root, e))?;
    fs::canonicalize(root).map_err(|e| DocumentError::io_at(root, e))
}

/// Ids must be usable as a visible file base name
fn validate_id(id: &str) -> DocumentResult<&str> {
    let valid = !id.is_empty()
        && !scanner::is_hidden_or_temp(id)
        && !id.contains(['/', '\\', '\0'])
        && id != "..";
    if valid {
        Ok(id)
    } else {
        Err(DocumentError::InvalidResource(format!(
            "invalid document id {:?}",
            id
        )))
    }
}

// ============================================================================
// Async Repository
// ============================================================================

async fn blocking<F, T>(f: F) -> DocumentResult<T>
where
    F: FnOnce() -> DocumentResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DocumentError::Io(io::Error::other(format!("Task join error: {}", e))))?
}

#[async_trait]
impl DocumentRepository for FileDocumentStore {
    async fn list_documents(&self, format: DocumentFormat) -> DocumentResult<Vec<Document>> {
        let store = self.clone();
        blocking(move || store.scan(format)).await
    }

    async fn get_document(
        &self,
        id: &str,
        format: DocumentFormat,
    ) -> DocumentResult<Option<Document>> {
        if self.is_deleted(id) {
            return Ok(None);
        }
        let store = self.clone();
        let id = id.to_string();
        blocking(move || store.resolve(&id, format)).await
    }

    async fn get_pages(&self, id: &str, format: DocumentFormat) -> DocumentResult<Vec<Page>> {
        if self.is_deleted(id) {
            return Ok(Vec::new());
        }
        let store = self.clone();
        let id = id.to_string();
        blocking(move || store.resolve_pages(&id, format)).await
    }

    async fn delete_document(&self, id: &str) -> DocumentResult<DeleteOutcome> {
        let store = self.clone();
        let id = id.to_string();
        blocking(move || store.remove(&id)).await
    }

    async fn save_document(&self, document: &Document) -> DocumentResult<()> {
        let store = self.clone();
        let document = document.clone();
        blocking(move || store.save(&document)).await
    }

    fn is_deleted(&self, id: &str) -> bool {
        FileDocumentStore::is_deleted(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ErrorKind, PixelBuffer};
    use tempfile::TempDir;

    /// Treats any file starting with `%PDF` as a PDF with one page per
    /// line after the header.
    struct LinePdfRenderer;

    impl LinePdfRenderer {
        fn lines(source: &DocumentSource) -> Option<usize> {
            let DocumentSource::Path(path) = source else {
                return None;
            };
            let text = fs::read_to_string(path).ok()?;
            let mut lines = text.lines();
            (lines.next()? == "%PDF").then(|| lines.count())
        }
    }

    impl PageRenderer for LinePdfRenderer {
        fn is_valid_pdf(&self, source: &DocumentSource) -> bool {
            Self::lines(source).is_some()
        }

        fn page_count(&self, source: &DocumentSource) -> DocumentResult<usize> {
            Self::lines(source).ok_or_else(|| DocumentError::InvalidResource(source.uri()))
        }

        fn extract_pages(&self, source: &DocumentSource) -> Vec<Page> {
            let count = Self::lines(source).unwrap_or(0);
            (0..count).map(|i| Page::pdf(&source.uri(), i)).collect()
        }

        fn render_page(
            &self,
            _source: &DocumentSource,
            _page_index: usize,
            _max_dimension: Option<u32>,
        ) -> DocumentResult<PixelBuffer> {
            Err(DocumentError::Render("not used".into()))
        }

        fn get_metadata(&self, source: &DocumentSource) -> Option<PdfMetadata> {
            Some(PdfMetadata {
                page_count: Self::lines(source)?,
                ..Default::default()
            })
        }
    }

    fn store() -> (TempDir, FileDocumentStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open(temp_dir.path(), Arc::new(LinePdfRenderer)).unwrap();
        (temp_dir, store)
    }

    fn pdf(store: &FileDocumentStore, name: &str, pages: usize) {
        let body = std::iter::once("%PDF".to_string())
            .chain((0..pages).map(|i| format!("page {}", i)))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(store.root().join(name), body).unwrap();
    }

    #[test]
    fn test_scan_by_format() {
        let (_dir, store) = store();
        pdf(&store, "a.pdf", 2);
        fs::write(store.root().join("b.png"), b"png").unwrap();
        fs::write(store.root().join("c.pdf"), b"garbage").unwrap();

        let pdfs = store.scan(DocumentFormat::Pdf).unwrap();
        assert_eq!(pdfs.len(), 1);
        assert_eq!(pdfs[0].id, "a");
        assert_eq!(pdfs[0].pages.len(), 2);
        assert_eq!(pdfs[0].pages[1].order, 1);

        let pngs = store.scan(DocumentFormat::Png).unwrap();
        assert_eq!(pngs.len(), 1);
        assert_eq!(pngs[0].pages.len(), 1);
        assert_eq!(pngs[0].pages[0].id, "page-0");

        assert!(store.scan(DocumentFormat::Jpg).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_base_name_first_valid_wins() {
        let (_dir, store) = store();
        fs::write(store.root().join("a.PDF"), b"garbage").unwrap();
        pdf(&store, "a.pdf", 3);

        let docs = store.scan(DocumentFormat::Pdf).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].pages.len(), 3);

        let resolved = store.resolve("a", DocumentFormat::Pdf).unwrap().unwrap();
        assert_eq!(resolved.pages.len(), 3);
    }

    #[test]
    fn test_delete_then_recreate_stays_hidden() {
        let (_dir, store) = store();
        pdf(&store, "a.pdf", 1);
        fs::write(store.root().join("a.png"), b"png").unwrap();

        let outcome = store.remove("a").unwrap();
        assert_eq!(outcome.removed.len(), 2);
        assert!(store.is_deleted("a"));

        pdf(&store, "a.pdf", 1);
        assert!(store.resolve("a", DocumentFormat::Pdf).unwrap().is_none());
        assert!(store.scan(DocumentFormat::Pdf).unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let (_dir, store) = store();
        let outcome = store.remove("ghost").unwrap();
        assert!(outcome.is_noop());
        assert!(!store.is_deleted("ghost"));
    }

    #[test]
    fn test_pdf_backs_id_over_image() {
        let (_dir, store) = store();
        pdf(&store, "a.pdf", 2);
        fs::write(store.root().join("a.png"), b"png").unwrap();
        fs::write(store.root().join("b.pdf"), b"garbage").unwrap();
        fs::write(store.root().join("b.png"), b"png").unwrap();

        let pdfs = store.scan(DocumentFormat::Pdf).unwrap();
        assert_eq!(pdfs.len(), 1);
        assert_eq!(pdfs[0].id, "a");

        // b.pdf has no pages, so b.png backs "b"
        let pngs = store.scan(DocumentFormat::Png).unwrap();
        let ids: Vec<_> = pngs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);

        assert!(store.resolve("a", DocumentFormat::Png).unwrap().is_none());
        assert!(store.resolve("b", DocumentFormat::Pdf).unwrap().is_none());
        assert_eq!(
            store.resolve("b", DocumentFormat::Png).unwrap().unwrap().format,
            DocumentFormat::Png
        );
    }

    fn refuse_png(path: &Path) -> io::Result<()> {
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        fs::remove_file(path)
    }

    fn store_with_remover(
        remove_file: fn(&Path) -> io::Result<()>,
    ) -> (TempDir, FileDocumentStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore {
            inner: Arc::new(StoreInner {
                root: prepare_root(temp_dir.path()).unwrap(),
                renderer: Arc::new(LinePdfRenderer),
                deleted: Arc::new(InMemoryDeletedIds::new()),
                remove_file,
            }),
        };
        (temp_dir, store)
    }

    #[test]
    fn test_partial_delete_keeps_id_live() {
        let (_dir, store) = store_with_remover(refuse_png);
        pdf(&store, "a.pdf", 1);
        fs::write(store.root().join("a.png"), b"png").unwrap();

        let err = store.remove("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialDeleteFailure);
        match &err {
            DocumentError::PartialDelete { removed, failed, .. } => {
                assert_eq!(removed.len(), 1);
                assert_eq!(failed.len(), 1);
                assert!(failed[0].0.ends_with("a.png"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(!store.is_deleted("a"));
        assert!(!store.root().join("a.pdf").exists());
        // The remnant resurfaces on the next scan
        assert!(store.resolve("a", DocumentFormat::Png).unwrap().is_some());
    }

    #[test]
    fn test_delete_with_nothing_removed_is_io_failure() {
        let (_dir, store) = store_with_remover(refuse_png);
        fs::write(store.root().join("b.png"), b"png").unwrap();

        let err = store.remove("b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(matches!(err, DocumentError::IoAt { .. }));
        assert!(!store.is_deleted("b"));
        assert!(store.root().join("b.png").exists());
    }

    #[test]
    fn test_save_requires_existing_document() {
        let (_dir, store) = store();
        pdf(&store, "a.pdf", 1);

        let mut doc = store.resolve("a", DocumentFormat::Pdf).unwrap().unwrap();
        doc.tags = vec!["tax".into()];
        doc.score = 7;
        store.save(&doc).unwrap();

        let reloaded = store.resolve("a", DocumentFormat::Pdf).unwrap().unwrap();
        assert_eq!(reloaded.tags, vec!["tax".to_string()]);
        assert_eq!(reloaded.score, 7);

        doc.id = "missing".into();
        let err = store.save(&doc).unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_import_bytes() {
        let (_dir, store) = store();
        pdf(&store, "a.pdf", 1);

        let doc = store.import_bytes("scan.png", png_bytes(), Some("receipt")).unwrap();
        assert_eq!(doc.id, "receipt");
        assert_eq!(doc.format, DocumentFormat::Png);
        assert!(store.root().join("receipt.png").exists());

        let generated = store.import_bytes("noext", png_bytes(), None).unwrap();
        assert_eq!(generated.format, DocumentFormat::Png);
        assert!(Uuid::parse_str(&generated.id).is_ok());

        let err = store.import_bytes("x.png", png_bytes(), Some("a")).unwrap_err();
        assert!(matches!(err, DocumentError::AlreadyExists(_)));

        let err = store.import_bytes("x.png", png_bytes(), Some("../up")).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidResource(_)));

        let err = store.import_bytes("x.png", b"not an image".to_vec(), None).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidResource(_)));

        let leftovers = fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("temp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_import_rejects_deleted_id() {
        let (_dir, store) = store();
        store.import_bytes("a.png", png_bytes(), Some("a")).unwrap();
        store.remove("a").unwrap();

        let err = store.import_bytes("a.png", png_bytes(), Some("a")).unwrap_err();
        assert!(matches!(err, DocumentError::AlreadyExists(_)));
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("scan-01").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id(".hidden").is_err());
        assert!(validate_id("temp-1").is_err());
        assert!(validate_id("a/b").is_err());
    }

    #[tokio::test]
    async fn test_repository_hides_deleted_ids() {
        let (_dir, store) = store();
        pdf(&store, "a.pdf", 2);
        let repo: Arc<dyn DocumentRepository> = Arc::new(store.clone());

        assert_eq!(repo.get_pages("a", DocumentFormat::Pdf).await.unwrap().len(), 2);

        repo.delete_document("a").await.unwrap();
        assert!(repo.is_deleted("a"));
        assert!(repo.get_document("a", DocumentFormat::Pdf).await.unwrap().is_none());
        assert!(repo.get_pages("a", DocumentFormat::Pdf).await.unwrap().is_empty());
        assert!(repo.delete_document("a").await.unwrap().is_noop());
    }
}

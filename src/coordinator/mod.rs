//! Load coordination
//!
//! Sequences document listing and page materialization on top of a
//! [`DocumentRepository`], a [`PageRenderer`] and a [`BitmapCache`]:
//!
//! - a new list or page load for a target supersedes the previous one, even
//!   while it is mid-render;
//! - pages already in the cache are never rendered;
//! - pages of a deleted document are never rendered.
//!
//! Superseded work may still fill the cache, but its results are never
//! published to callers.

mod generation;

pub use generation::{GenerationTable, LoadState, LoadTarget, Ticket};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::timeout;

use crate::cache::{BitmapCache, KeyValidator, PageKey};
use crate::document::{
    DeleteOutcome, Document, DocumentError, DocumentFormat, DocumentRepository, DocumentResult,
    Page, PageLocator, PageRenderer, PixelBuffer,
};
use crate::formats;

/// Default render timeout in seconds
pub const RENDER_TIMEOUT_SECS: u64 = 30;

/// Default number of pages rendered in parallel per load
pub const RENDER_CONCURRENCY: usize = 4;

/// Result of an operation that can be superseded
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    /// A newer request for the same target took over; nothing was published
    Superseded,
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Outcome::Superseded)
    }
}

/// A page with its pixels
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub page: Page,
    pub bitmap: PixelBuffer,
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub render_timeout: Duration,
    /// Pages rendered in parallel within one load
    pub concurrency: usize,
    /// Bound on the longer side of rendered bitmaps
    pub max_dimension: Option<u32>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            render_timeout: Duration::from_secs(RENDER_TIMEOUT_SECS),
            concurrency: RENDER_CONCURRENCY,
            max_dimension: None,
        }
    }
}

/// Per-page result inside one load
enum PageSlot {
    Loaded(LoadedPage),
    /// Superseded or deleted before the render
    Skipped,
}

// ============================================================================
// Load Coordinator
// ============================================================================

/// Coordinates listing, rendering and caching
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct LoadCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    repo: Arc<dyn DocumentRepository>,
    renderer: Arc<dyn PageRenderer>,
    cache: Arc<BitmapCache>,
    options: CoordinatorOptions,
    generations: GenerationTable,
    /// Latest published document list
    documents: watch::Sender<Vec<Document>>,
    /// Page records of the latest completed load per document id; pixels
    /// stay in the cache
    pages: Mutex<HashMap<String, Vec<Page>>>,
    /// Background loads owned by the coordinator, with their generation
    tasks: Mutex<HashMap<LoadTarget, (u64, AbortHandle)>>,
}

impl LoadCoordinator {
    /// Create a coordinator with its own cache of `cache_capacity_bytes`
    ///
    /// The cache refuses to serve pages of documents the repository reports
    /// as deleted.
    pub fn new(
        repo: Arc<dyn DocumentRepository>,
        renderer: Arc<dyn PageRenderer>,
        cache_capacity_bytes: usize,
        options: CoordinatorOptions,
    ) -> Self {
        let cache = BitmapCache::new(cache_capacity_bytes)
            .with_validator(deleted_key_validator(Arc::clone(&repo)));
        Self::with_cache(repo, renderer, Arc::new(cache), options)
    }

    /// Create a coordinator over an existing cache
    pub fn with_cache(
        repo: Arc<dyn DocumentRepository>,
        renderer: Arc<dyn PageRenderer>,
        cache: Arc<BitmapCache>,
        options: CoordinatorOptions,
    ) -> Self {
        let (documents, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(CoordinatorInner {
                repo,
                renderer,
                cache,
                options,
                generations: GenerationTable::new(),
                documents,
                pages: Mutex::new(HashMap::new()),
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<BitmapCache> {
        &self.inner.cache
    }

    pub fn state(&self, target: &LoadTarget) -> LoadState {
        self.inner.generations.state(target)
    }

    /// Receiver of the latest completed document list
    pub fn subscribe_documents(&self) -> watch::Receiver<Vec<Document>> {
        self.inner.documents.subscribe()
    }

    /// Pages of the latest completed load for `document_id`
    pub fn loaded_pages(&self, document_id: &str) -> Option<Vec<Page>> {
        self.inner.pages.lock().get(document_id).cloned()
    }

    // ------------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------------

    /// List documents of `format`, superseding any list still running for it
    pub async fn list_documents(
        &self,
        format: DocumentFormat,
    ) -> DocumentResult<Outcome<Vec<Document>>> {
        let ticket = self.inner.generations.begin(LoadTarget::DocumentList(format));
        self.run_list(ticket, format).await
    }

    /// Background [`list_documents`](Self::list_documents); aborts the previous one
    pub fn spawn_list(
        &self,
        format: DocumentFormat,
    ) -> JoinHandle<DocumentResult<Outcome<Vec<Document>>>> {
        let ticket = self.inner.generations.begin(LoadTarget::DocumentList(format));
        let owned = ticket.clone();
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_list(ticket, format).await });
        self.own_task(&owned, &handle);
        handle
    }

    async fn run_list(
        &self,
        ticket: Ticket,
        format: DocumentFormat,
    ) -> DocumentResult<Outcome<Vec<Document>>> {
        match self.inner.repo.list_documents(format).await {
            Ok(mut documents) => {
                let repo = &self.inner.repo;
                let published = self.inner.generations.complete(&ticket, || {
                    // Deletes may have landed while the scan ran
                    documents.retain(|document| !repo.is_deleted(&document.id));
                    self.inner.documents.send_replace(documents.clone());
                });
                if published {
                    tracing::debug!(format = %format, count = documents.len(), "Published document list");
                    Ok(Outcome::Completed(documents))
                } else {
                    tracing::debug!(format = %format, "Document list superseded");
                    Ok(Outcome::Superseded)
                }
            }
            Err(e) => self.failed(&ticket, e),
        }
    }

    // ------------------------------------------------------------------------
    // Page loading
    // ------------------------------------------------------------------------

    /// Materialize every page of a document, in page order
    ///
    /// Cached pages are reused; the rest are rendered with bounded
    /// parallelism and written back to the cache.
    pub async fn load_pages(
        &self,
        document_id: &str,
        format: DocumentFormat,
    ) -> DocumentResult<Outcome<Vec<LoadedPage>>> {
        let ticket = self
            .inner
            .generations
            .begin(LoadTarget::Pages(document_id.to_string()));
        self.run_load(ticket, document_id.to_string(), format).await
    }

    /// Background [`load_pages`](Self::load_pages); aborts the previous one
    pub fn spawn_load_pages(
        &self,
        document_id: &str,
        format: DocumentFormat,
    ) -> JoinHandle<DocumentResult<Outcome<Vec<LoadedPage>>>> {
        let ticket = self
            .inner
            .generations
            .begin(LoadTarget::Pages(document_id.to_string()));
        let owned = ticket.clone();
        let this = self.clone();
        let id = document_id.to_string();
        let handle = tokio::spawn(async move { this.run_load(ticket, id, format).await });
        self.own_task(&owned, &handle);
        handle
    }

    async fn run_load(
        &self,
        ticket: Ticket,
        document_id: String,
        format: DocumentFormat,
    ) -> DocumentResult<Outcome<Vec<LoadedPage>>> {
        match self.render_pages(&ticket, &document_id, format).await {
            Ok(Some(pages)) => {
                let published = self.inner.generations.complete(&ticket, || {
                    let records = pages.iter().map(|loaded| loaded.page.clone()).collect();
                    self.inner.pages.lock().insert(document_id.clone(), records);
                });
                if published {
                    Ok(Outcome::Completed(pages))
                } else {
                    Ok(Outcome::Superseded)
                }
            }
            Ok(None) => {
                tracing::debug!(document_id = %document_id, "Page load superseded");
                Ok(Outcome::Superseded)
            }
            Err(e) => self.failed(&ticket, e),
        }
    }

    async fn render_pages(
        &self,
        ticket: &Ticket,
        document_id: &str,
        format: DocumentFormat,
    ) -> DocumentResult<Option<Vec<LoadedPage>>> {
        let pages = self.inner.repo.get_pages(document_id, format).await?;
        if pages.is_empty() {
            return Err(DocumentError::NotFound(document_id.to_string()));
        }
        if !self.inner.generations.is_current(ticket) {
            return Ok(None);
        }

        let slots: Vec<PageSlot> = stream::iter(pages)
            .map(|page| self.load_slot(ticket, document_id, page))
            .buffered(self.inner.options.concurrency.max(1))
            .try_collect()
            .await?;

        if !self.inner.generations.is_current(ticket) {
            return Ok(None);
        }
        if self.inner.repo.is_deleted(document_id) {
            return Err(DocumentError::NotFound(document_id.to_string()));
        }

        let mut loaded = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                PageSlot::Loaded(page) => loaded.push(page),
                PageSlot::Skipped => return Ok(None),
            }
        }
        Ok(Some(loaded))
    }

    async fn load_slot(
        &self,
        ticket: &Ticket,
        document_id: &str,
        page: Page,
    ) -> DocumentResult<PageSlot> {
        let key = PageKey::new(document_id, page.order);
        if let Some(bitmap) = self.inner.cache.get(&key) {
            return Ok(PageSlot::Loaded(LoadedPage { page, bitmap }));
        }

        if !self.inner.generations.is_current(ticket) {
            return Ok(PageSlot::Skipped);
        }
        if self.inner.repo.is_deleted(document_id) {
            tracing::debug!(document_id = %document_id, page = page.order, "Skipping render of deleted document");
            return Ok(PageSlot::Skipped);
        }

        let bitmap = self.render(page.locator()).await?;

        // Superseded renders still fill the cache
        if !self.inner.repo.is_deleted(document_id) {
            self.inner.cache.put(key, bitmap.clone());
        }
        if !self.inner.generations.is_current(ticket) {
            return Ok(PageSlot::Skipped);
        }

        Ok(PageSlot::Loaded(LoadedPage { page, bitmap }))
    }

    /// Materialize one page, cache before render
    ///
    /// The document is resolved first, so a request for a format that does
    /// not back `document_id` fails instead of hitting its cached pages. Not
    /// tied to any load target, so it never supersedes anything.
    pub async fn load_page(
        &self,
        document_id: &str,
        format: DocumentFormat,
        page_index: usize,
    ) -> DocumentResult<PixelBuffer> {
        let pages = self.inner.repo.get_pages(document_id, format).await?;
        if pages.is_empty() {
            return Err(DocumentError::NotFound(document_id.to_string()));
        }
        let page = pages
            .iter()
            .find(|page| page.order == page_index)
            .ok_or(DocumentError::PageOutOfRange {
                index: page_index,
                page_count: pages.len(),
            })?;

        let key = PageKey::new(document_id, page_index);
        if let Some(bitmap) = self.inner.cache.get(&key) {
            return Ok(bitmap);
        }

        if self.inner.repo.is_deleted(document_id) {
            return Err(DocumentError::NotFound(document_id.to_string()));
        }
        let bitmap = self.render(page.locator()).await?;
        if !self.inner.repo.is_deleted(document_id) {
            self.inner.cache.put(key, bitmap.clone());
        }
        Ok(bitmap)
    }

    async fn render(&self, locator: PageLocator) -> DocumentResult<PixelBuffer> {
        let renderer = Arc::clone(&self.inner.renderer);
        let max_dimension = self.inner.options.max_dimension;
        let limit = self.inner.options.render_timeout;

        let task = tokio::task::spawn_blocking(move || {
            formats::rasterize(renderer.as_ref(), &locator, max_dimension)
        });

        timeout(limit, task)
            .await
            .map_err(|_| DocumentError::Timeout(limit.as_secs()))?
            .map_err(|e| DocumentError::Render(format!("Task join error: {}", e)))?
    }

    // ------------------------------------------------------------------------
    // Deletion and cancellation
    // ------------------------------------------------------------------------

    /// Delete a document, superseding its page load and dropping its bitmaps
    pub async fn delete_document(&self, document_id: &str) -> DocumentResult<DeleteOutcome> {
        self.cancel(&LoadTarget::Pages(document_id.to_string()));

        let result = self.inner.repo.delete_document(document_id).await;

        let evicted = self.inner.cache.invalidate_document(document_id);
        self.inner.pages.lock().remove(document_id);
        if result.is_ok() {
            self.inner.documents.send_if_modified(|documents| {
                let before = documents.len();
                documents.retain(|document| document.id != document_id);
                documents.len() != before
            });
        }

        match &result {
            Ok(outcome) => {
                tracing::info!(document_id = %document_id, files = outcome.removed.len(), evicted, "Document deleted")
            }
            Err(e) => tracing::warn!(document_id = %document_id, error = %e, evicted, "Delete failed"),
        }
        result
    }

    /// Supersede whatever is running for `target`
    pub fn cancel(&self, target: &LoadTarget) {
        self.inner.generations.cancel(target);
        if let Some((_, handle)) = self.inner.tasks.lock().remove(target) {
            handle.abort();
        }
    }

    /// Cancel every load and empty the cache
    pub fn shutdown(&self) {
        self.inner.generations.cancel_all();
        let tasks: Vec<AbortHandle> = self
            .inner
            .tasks
            .lock()
            .drain()
            .map(|(_, (_, handle))| handle)
            .collect();
        for handle in &tasks {
            handle.abort();
        }
        self.inner.cache.clear();
        self.inner.pages.lock().clear();
        tracing::info!(aborted = tasks.len(), "Load coordinator shut down");
    }

    /// Track a spawned load, aborting only loads of strictly older generations
    fn own_task<T>(&self, ticket: &Ticket, handle: &JoinHandle<T>) {
        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|_, (_, task)| !task.is_finished());

        let newer_registered = matches!(
            tasks.get(&ticket.target),
            Some((generation, _)) if *generation > ticket.generation
        );
        if newer_registered {
            // This load is already stale
            handle.abort();
            return;
        }

        let entry = (ticket.generation, handle.abort_handle());
        if let Some((_, previous)) = tasks.insert(ticket.target.clone(), entry) {
            previous.abort();
        }
    }

    fn failed<T>(&self, ticket: &Ticket, error: DocumentError) -> DocumentResult<Outcome<T>> {
        if self.inner.generations.fail(ticket, error.to_string()) {
            tracing::warn!(load = %ticket.target, error = %error, "Load failed");
            Err(error)
        } else {
            Ok(Outcome::Superseded)
        }
    }
}

/// Validator hiding cached pages of documents deleted in `repo`
pub fn deleted_key_validator(repo: Arc<dyn DocumentRepository>) -> KeyValidator {
    Arc::new(move |key: &PageKey| !repo.is_deleted(&key.document_id))
}

//! Page bitmap cache with byte-budget LRU eviction
//!
//! Entries are keyed by `(document id, page index)` and cost their actual
//! pixel allocation. Every `get` and `put` counts as a use.
//!
//! # Thread Safety
//!
//! The entry map sits behind a single `parking_lot::Mutex`; no lock is held
//! while rendering. A `put` racing an `invalidate` for the same key may
//! leave a stale entry, which the key validator removes on the next `get`.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::document::PixelBuffer;

/// Cache key for a rendered page
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PageKey {
    pub document_id: String,
    pub page_index: usize,
}

impl PageKey {
    pub fn new(document_id: &str, page_index: usize) -> Self {
        Self {
            document_id: document_id.to_string(),
            page_index,
        }
    }
}

/// Decides on every `get` whether a cached key is still allowed to be served
pub type KeyValidator = Arc<dyn Fn(&PageKey) -> bool + Send + Sync>;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitmapCacheStats {
    pub entries: usize,
    pub used_bytes: usize,
    pub capacity_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl BitmapCacheStats {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    entries: LruCache<PageKey, PixelBuffer>,
    used_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheState {
    fn remove(&mut self, key: &PageKey) -> Option<PixelBuffer> {
        let buffer = self.entries.pop(key)?;
        self.used_bytes = self.used_bytes.saturating_sub(buffer.byte_size());
        Some(buffer)
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.used_bytes > capacity {
            match self.entries.pop_lru() {
                Some((key, buffer)) => {
                    self.used_bytes = self.used_bytes.saturating_sub(buffer.byte_size());
                    self.evictions += 1;
                    tracing::trace!(
                        document_id = %key.document_id,
                        page_index = key.page_index,
                        bytes = buffer.byte_size(),
                        "Evicted page bitmap"
                    );
                }
                None => break,
            }
        }
    }
}

/// Byte-bounded LRU cache of decoded page bitmaps
pub struct BitmapCache {
    state: Mutex<CacheState>,
    capacity_bytes: usize,
    validator: Option<KeyValidator>,
}

impl BitmapCache {
    /// Create a cache holding at most `capacity_bytes` of pixels
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                used_bytes: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            capacity_bytes,
            validator: None,
        }
    }

    /// Attach a validator consulted on every `get`
    pub fn with_validator(mut self, validator: KeyValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Look up a live bitmap
    ///
    /// Recycled buffers and keys rejected by the validator are dropped and
    /// reported as a miss.
    pub fn get(&self, key: &PageKey) -> Option<PixelBuffer> {
        let still_valid = self.validator.as_ref().map_or(true, |valid| valid(key));

        let mut state = self.state.lock();
        if !still_valid {
            state.remove(key);
            state.misses += 1;
            return None;
        }

        let lookup = state
            .entries
            .get(key)
            .map(|buffer| (buffer.is_recycled(), buffer.clone()));

        match lookup {
            Some((false, buffer)) => {
                state.hits += 1;
                Some(buffer)
            }
            Some((true, _)) => {
                state.remove(key);
                state.misses += 1;
                None
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Insert a bitmap, evicting least-recently-used entries over budget
    ///
    /// Returns `false` without touching the cache for recycled buffers and
    /// for buffers larger than the whole budget.
    pub fn put(&self, key: PageKey, buffer: PixelBuffer) -> bool {
        if buffer.is_recycled() {
            tracing::debug!(document_id = %key.document_id, "Rejected recycled bitmap");
            return false;
        }

        let size = buffer.byte_size();
        if size > self.capacity_bytes {
            tracing::debug!(
                document_id = %key.document_id,
                page_index = key.page_index,
                bytes = size,
                capacity = self.capacity_bytes,
                "Bitmap larger than cache budget"
            );
            return false;
        }

        let mut state = self.state.lock();
        if let Some(previous) = state.entries.put(key, buffer) {
            state.used_bytes = state.used_bytes.saturating_sub(previous.byte_size());
        }
        state.used_bytes += size;
        state.evict_to(self.capacity_bytes);
        true
    }

    /// Remove every entry whose key matches
    pub fn invalidate<F>(&self, predicate: F) -> usize
    where
        F: Fn(&PageKey) -> bool,
    {
        let mut state = self.state.lock();
        let keys_to_remove: Vec<PageKey> = state
            .entries
            .iter()
            .filter(|(k, _)| predicate(k))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &keys_to_remove {
            state.remove(key);
        }

        keys_to_remove.len()
    }

    /// Remove every page of one document
    pub fn invalidate_document(&self, document_id: &str) -> usize {
        let removed = self.invalidate(|key| key.document_id == document_id);
        if removed > 0 {
            tracing::debug!(document_id = %document_id, removed, "Invalidated cached pages");
        }
        removed
    }

    /// Empty the cache
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.used_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.state.lock().used_bytes
    }

    pub fn stats(&self) -> BitmapCacheStats {
        let state = self.state.lock();
        BitmapCacheStats {
            entries: state.entries.len(),
            used_bytes: state.used_bytes,
            capacity_bytes: self.capacity_bytes,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }
}

//! Soft-delete tracking
//!
//! Ids land here once every backing file of a document has been removed,
//! and stay for the lifetime of the set. Any id present is hidden from all
//! store reads, even if a file with that base name reappears.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::document::{DocumentError, DocumentResult};

/// Set of soft-deleted document ids
pub trait DeletedIdSet: Send + Sync {
    fn contains(&self, id: &str) -> bool;

    /// Record `id`; inserting an id twice is not an error
    fn insert(&self, id: &str) -> DocumentResult<()>;

    /// Snapshot of all ids, sorted
    fn ids(&self) -> Vec<String>;

    fn len(&self) -> usize {
        self.ids().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime deleted ids
#[derive(Debug, Default)]
pub struct InMemoryDeletedIds {
    ids: RwLock<HashSet<String>>,
}

impl InMemoryDeletedIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeletedIdSet for InMemoryDeletedIds {
    fn contains(&self, id: &str) -> bool {
        self.ids.read().contains(id)
    }

    fn insert(&self, id: &str) -> DocumentResult<()> {
        self.ids.write().insert(id.to_string());
        Ok(())
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.read().iter().cloned().collect();
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        self.ids.read().len()
    }
}

/// Deleted ids persisted as empty marker files in one directory
///
/// Markers are loaded once on open; later inserts write the marker before
/// updating the in-memory set.
#[derive(Debug)]
pub struct MarkerFileDeletedIds {
    dir: PathBuf,
    ids: RwLock<HashSet<String>>,
}

impl MarkerFileDeletedIds {
    pub fn open<P: AsRef<Path>>(dir: P) -> DocumentResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| DocumentError::io_at(&dir, e))?;

        let mut ids = HashSet::new();
        for entry in fs::read_dir(&dir).map_err(|e| DocumentError::io_at(&dir, e))? {
            match entry {
                Ok(entry) => {
                    if let Some(name) = entry.file_name().to_str() {
                        ids.insert(name.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Unreadable deletion marker");
                }
            }
        }

        tracing::debug!(dir = %dir.display(), count = ids.len(), "Loaded deletion markers");

        Ok(Self {
            dir,
            ids: RwLock::new(ids),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DeletedIdSet for MarkerFileDeletedIds {
    fn contains(&self, id: &str) -> bool {
        self.ids.read().contains(id)
    }

    fn insert(&self, id: &str) -> DocumentResult<()> {
        if self.contains(id) {
            return Ok(());
        }

        let marker = self.dir.join(id);
        fs::write(&marker, b"").map_err(|e| DocumentError::io_at(&marker, e))?;
        self.ids.write().insert(id.to_string());
        Ok(())
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.read().iter().cloned().collect();
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        self.ids.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_set() {
        let set = InMemoryDeletedIds::new();
        assert!(set.is_empty());

        set.insert("b").unwrap();
        set.insert("a").unwrap();
        set.insert("a").unwrap();

        assert!(set.contains("a"));
        assert!(!set.contains("c"));
        assert_eq!(set.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_marker_files_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".deleted");

        {
            let set = MarkerFileDeletedIds::open(&dir).unwrap();
            set.insert("scan-1").unwrap();
            assert!(dir.join("scan-1").exists());
        }

        let reopened = MarkerFileDeletedIds::open(&dir).unwrap();
        assert!(reopened.contains("scan-1"));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_concurrent_inserts() {
        let set = std::sync::Arc::new(InMemoryDeletedIds::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let set = std::sync::Arc::clone(&set);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        set.insert(&format!("{}-{}", t, i)).unwrap();
                        assert!(set.contains(&format!("{}-{}", t, i)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(set.len(), 100);
    }
}

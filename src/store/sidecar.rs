//! Sidecar metadata for caller-editable document fields
//!
//! Stored as hidden JSON next to the backing file (`.<id>.meta.json`), so
//! directory scans never mistake it for a document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentError, DocumentResult};

/// Fields a caller may change through `save_document`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SidecarMetadata {
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub score: i64,
    pub thumbnail: Option<String>,
}

impl SidecarMetadata {
    pub fn from_document(document: &Document) -> Self {
        Self {
            title: Some(document.title.clone()),
            tags: document.tags.clone(),
            score: document.score,
            thumbnail: Some(document.thumbnail.clone()).filter(|t| !t.is_empty()),
        }
    }

    /// Overlay these fields onto a freshly resolved document
    pub fn apply(&self, document: &mut Document) {
        if let Some(title) = self.title.as_ref().filter(|t| !t.is_empty()) {
            document.title = title.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            document.thumbnail = thumbnail.clone();
        }
        document.tags = self.tags.clone();
        document.score = self.score;
    }
}

pub fn sidecar_path(root: &Path, id: &str) -> PathBuf {
    root.join(format!(".{}.meta.json", id))
}

/// Read the sidecar for `id`, `None` when there is none
pub fn read(root: &Path, id: &str) -> DocumentResult<Option<SidecarMetadata>> {
    let path = sidecar_path(root, id);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DocumentError::io_at(path, e)),
    }
}

/// Write the sidecar atomically (temp file + rename)
pub fn write(root: &Path, id: &str, metadata: &SidecarMetadata) -> DocumentResult<()> {
    let path = sidecar_path(root, id);
    let tmp = root.join(format!(".{}.meta.json.tmp", id));

    let json = serde_json::to_vec_pretty(metadata)?;
    fs::write(&tmp, json).map_err(|e| DocumentError::io_at(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(DocumentError::io_at(path, e));
    }
    Ok(())
}

/// Remove the sidecar; returns whether one existed
pub fn remove(root: &Path, id: &str) -> DocumentResult<bool> {
    let path = sidecar_path(root, id);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DocumentError::io_at(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::document::DocumentFormat;

    fn document() -> Document {
        Document {
            id: "receipt".into(),
            title: "receipt".into(),
            created_at: Utc::now(),
            format: DocumentFormat::Png,
            tags: Vec::new(),
            score: 0,
            thumbnail: String::new(),
            pages: Vec::new(),
        }
    }

    #[test]
    fn test_write_read_remove() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        assert_eq!(read(root, "receipt").unwrap(), None);

        let mut doc = document();
        doc.title = "Grocery receipt".into();
        doc.tags = vec!["food".into(), "2024".into()];
        doc.score = 3;
        write(root, "receipt", &SidecarMetadata::from_document(&doc)).unwrap();

        let stored = read(root, "receipt").unwrap().unwrap();
        assert_eq!(stored.tags, vec!["food".to_string(), "2024".to_string()]);
        assert_eq!(stored.thumbnail, None);

        let mut fresh = document();
        stored.apply(&mut fresh);
        assert_eq!(fresh.title, "Grocery receipt");
        assert_eq!(fresh.score, 3);

        assert!(remove(root, "receipt").unwrap());
        assert!(!remove(root, "receipt").unwrap());
    }

    #[test]
    fn test_corrupt_sidecar_is_metadata_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(sidecar_path(temp_dir.path(), "x"), b"{not json").unwrap();

        let err = read(temp_dir.path(), "x").unwrap_err();
        assert!(matches!(err, DocumentError::Metadata(_)));
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed: SidecarMetadata = serde_json::from_str(r#"{"score": 5}"#).unwrap();
        assert_eq!(parsed.score, 5);
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.title, None);
    }
}

//! Directory scanning
//!
//! Lists the candidate backing files in the store root. Per-entry failures
//! are logged and skipped; only an unreadable root fails the scan.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::document::{DocumentError, DocumentFormat, DocumentResult, FileKind};

/// Prefix of in-flight import files
pub const TEMP_PREFIX: &str = "temp";

/// A regular file in the store root that may back a document
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    /// Base name without the last extension
    pub id: String,
    pub kind: FileKind,
    pub modified: DateTime<Utc>,
}

impl Candidate {
    pub fn matches(&self, format: DocumentFormat) -> bool {
        self.kind.format() == Some(format)
    }
}

/// Names never considered documents
pub fn is_hidden_or_temp(name: &str) -> bool {
    name.starts_with('.') || name.starts_with(TEMP_PREFIX)
}

/// Base name of a path without its last extension
pub fn base_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

/// Every visible regular file in `root`, supported or not, sorted by file name
pub fn visible_files(root: &Path) -> DocumentResult<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| DocumentError::io_at(root, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::debug!(name = ?entry.file_name(), "Skipping non UTF-8 file name");
            continue;
        };
        if is_hidden_or_temp(name) {
            continue;
        }

        let path = entry.path();
        // Follows symlinks; a dangling link is skipped like a vanished file
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping vanished entry");
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Supported files in `root` in claim order
///
/// PDFs come before images; each group is in lexical file-name order. The
/// first candidate of an id that yields pages backs that id.
pub fn candidates(root: &Path) -> DocumentResult<Vec<Candidate>> {
    let mut out = Vec::new();

    for path in visible_files(root)? {
        let kind = FileKind::from_path(&path);
        if kind == FileKind::Unsupported {
            tracing::trace!(path = %path.display(), "Skipping unsupported file");
            continue;
        }

        let Some(id) = base_name(&path) else {
            continue;
        };

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(time) => time,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "No modification time");
                SystemTime::UNIX_EPOCH
            }
        };

        out.push(Candidate {
            path,
            id,
            kind,
            modified: DateTime::<Utc>::from(modified),
        });
    }

    // Stable, so file-name order survives within each group
    out.sort_by_key(|candidate| candidate.kind != FileKind::Pdf);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hidden_and_temp_names() {
        assert!(is_hidden_or_temp(".a.meta.json"));
        assert!(is_hidden_or_temp("temp-1234.pdf"));
        assert!(is_hidden_or_temp("temporary.png"));
        assert!(!is_hidden_or_temp("a.pdf"));
    }

    #[test]
    fn test_base_name_strips_last_extension() {
        assert_eq!(base_name(Path::new("/d/a.pdf")).as_deref(), Some("a"));
        assert_eq!(base_name(Path::new("/d/a.b.png")).as_deref(), Some("a.b"));
        assert_eq!(base_name(Path::new("/d/noext")).as_deref(), Some("noext"));
    }

    #[test]
    fn test_candidates_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["c.png", "a.pdf", "b.JPG", ".hidden.pdf", "temp-x.pdf", "notes.txt"] {
            fs::write(root.join(name), b"x").unwrap();
        }
        fs::create_dir(root.join("d.pdf")).unwrap();

        let found = candidates(root).unwrap();
        let ids: Vec<_> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(found[1].matches(DocumentFormat::Jpg));
        assert!(!found[1].matches(DocumentFormat::Jpeg));

        let visible = visible_files(root).unwrap();
        assert_eq!(visible.len(), 4);
    }

    #[test]
    fn test_candidates_put_pdfs_first() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["a.png", "b.pdf", "a.pdf", "c.jpg"] {
            fs::write(root.join(name), b"x").unwrap();
        }

        let names: Vec<_> = candidates(root)
            .unwrap()
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "a.png", "c.jpg"]);
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = candidates(&temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DocumentError::IoAt { .. }));
    }
}

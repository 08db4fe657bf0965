//! Low-level MuPDF wrapper
//!
//! MuPDF's `fz_context` is **NOT thread-safe** and its documents are not
//! `Send`. This module never lets an engine handle outlive the call that
//! opened it:
//!
//! 1. **SafeDocument**: remembers the source, opens a fresh document per operation
//! 2. **with_page**: validates the index against the page count before loading
//!
//! # Usage
//!
//! ```rust,ignore
//! let doc = SafeDocument::open(&DocumentSource::from_path("a.pdf"))?;
//! let bounds = doc.with_page(0, |page| Ok(page.bounds()?))?;
//! ```

mod safe;

pub use safe::SafeDocument;

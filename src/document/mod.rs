//! Document model
//!
//! Format-agnostic records, errors and the traits that connect the store,
//! the renderer and the load coordinator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  LoadCoordinator                        │
//! │  (supersession, cache-first page loads)                 │
//! └─────────────────────────────────────────────────────────┘
//!           │                │                 │
//!           ▼                ▼                 ▼
//!   ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//!   │ Document     │ │ BitmapCache  │ │ PageRenderer │
//!   │ Repository   │ │ (byte LRU)   │ │ (MuPDF)      │
//!   └──────────────┘ └──────────────┘ └──────────────┘
//!           │                                  ▲
//!           └──────────── PDF expansion ───────┘
//! ```

mod error;
mod traits;
mod types;

pub use error::{DocumentError, DocumentResult, ErrorKind, Result};
pub use traits::{DeleteOutcome, DocumentRepository, PageRenderer};
pub use types::{
    Document, DocumentFormat, DocumentSource, FileKind, Page, PageLocator, PdfMetadata,
    PixelBuffer, PixelFormat,
};

//! Scanshelf Library
//!
//! A local library of scanned documents (PDFs and single-page images) kept
//! in one directory, with page rendering and an in-memory bitmap cache.
//! The command-line front end is in main.rs.
//!
//! # Modules
//!
//! - `document`: Document model, errors and the repository/renderer traits
//! - `formats`: PDF rendering via MuPDF and image decoding
//! - `store`: File-backed document store with soft deletes
//! - `cache`: Byte-budget LRU cache of rendered pages
//! - `coordinator`: Superseding list/page loads over store, renderer and cache
//! - `config`: Environment configuration

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod formats;
pub mod store;

// Scoped MuPDF access used by formats::pdf
mod mupdf;

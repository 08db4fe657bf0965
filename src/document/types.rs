//! Core document types
//!
//! Value records handed to callers, the page locator format, and the pixel
//! buffers produced by rendering.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use super::error::{DocumentError, DocumentResult};

/// Fragment separating a PDF path from its page index in a locator
const PAGE_FRAGMENT: &str = "#page=";

/// Logical document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Jpg,
    Jpeg,
    Png,
}

impl DocumentFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" => Some(Self::Jpg),
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Detect format from magic bytes
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        if bytes.starts_with(b"%PDF") {
            return Some(Self::Pdf);
        }

        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            return Some(Self::Png);
        }

        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        None
    }

    /// Lowercase extension / format name
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Jpg => "jpg",
            DocumentFormat::Jpeg => "jpeg",
            DocumentFormat::Png => "png",
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, DocumentFormat::Pdf)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim()).ok_or_else(|| DocumentError::Unsupported(s.to_string()))
    }
}

/// What a file on disk is, resolved once from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image(DocumentFormat),
    Unsupported,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DocumentFormat::from_extension);

        match format {
            Some(DocumentFormat::Pdf) => FileKind::Pdf,
            Some(image) => FileKind::Image(image),
            None => FileKind::Unsupported,
        }
    }

    pub fn format(&self) -> Option<DocumentFormat> {
        match self {
            FileKind::Pdf => Some(DocumentFormat::Pdf),
            FileKind::Image(format) => Some(*format),
            FileKind::Unsupported => None,
        }
    }
}

/// Source data for a renderable resource
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file in the store or handed over by an importer
    Path(PathBuf),
    /// In-memory bytes with the name they arrived under
    Bytes { name: String, data: Arc<Vec<u8>> },
}

impl DocumentSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            name: name.into(),
            data: Arc::new(data),
        }
    }

    /// Name used as the resource part of page locators
    pub fn uri(&self) -> String {
        match self {
            DocumentSource::Path(path) => path.display().to_string(),
            DocumentSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// A stored document and its pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Backing file base name
    pub id: String,
    pub title: String,
    /// Backing file modification time
    pub created_at: DateTime<Utc>,
    pub format: DocumentFormat,
    pub tags: Vec<String>,
    pub score: i64,
    /// Thumbnail locator, empty when unset
    pub thumbnail: String,
    pub pages: Vec<Page>,
}

/// One page of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    /// Locator string, see [`PageLocator`]
    pub image_uri: String,
    /// Zero-based display and render order
    pub order: usize,
    #[serde(default)]
    pub is_enhanced: bool,
}

impl Page {
    /// Page backed by a whole image file
    pub fn image(path: &Path) -> Self {
        Self {
            id: "page-0".to_string(),
            image_uri: PageLocator::image(path).to_string(),
            order: 0,
            is_enhanced: false,
        }
    }

    /// Page `index` of a PDF resource named `resource`
    pub fn pdf(resource: &str, index: usize) -> Self {
        Self {
            id: format!("page-{}", index),
            image_uri: format!("{}{}{}", resource, PAGE_FRAGMENT, index),
            order: index,
            is_enhanced: false,
        }
    }

    pub fn locator(&self) -> PageLocator {
        PageLocator::parse(&self.image_uri)
    }
}

/// Parsed form of a page's `image_uri`
///
/// `"<path>"` addresses a whole image file; `"<path>#page=<n>"` addresses
/// page `n` (zero-based) of a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocator {
    pub path: PathBuf,
    pub page: Option<usize>,
}

impl PageLocator {
    pub fn image(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            page: None,
        }
    }

    pub fn pdf_page(path: &Path, page: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            page: Some(page),
        }
    }

    /// Parse a locator string
    ///
    /// A trailing fragment that is not a valid page number is kept as part
    /// of the path.
    pub fn parse(uri: &str) -> Self {
        if let Some((path, page)) = uri.rsplit_once(PAGE_FRAGMENT) {
            if let Ok(page) = page.parse::<usize>() {
                return Self {
                    path: PathBuf::from(path),
                    page: Some(page),
                };
            }
        }

        Self {
            path: PathBuf::from(uri),
            page: None,
        }
    }
}

impl fmt::Display for PageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "{}{}{}", self.path.display(), PAGE_FRAGMENT, page),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Lightweight PDF metadata
///
/// Fields that cannot be determined are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub page_count: usize,
    pub byte_size: u64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub creation_date: Option<String>,
    pub password_protected: Option<bool>,
}

/// Pixel layout of a [`PixelBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Decoded page bitmap
///
/// Clones share the same pixels. Once [`recycle`](Self::recycle) has been
/// called on any clone, the pixels are no longer handed out.
#[derive(Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Arc<[u8]>,
    recycled: Arc<AtomicBool>,
}

impl PixelBuffer {
    /// Wrap raw pixels, checking the length against the dimensions
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> DocumentResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(DocumentError::InvalidResource(format!(
                "pixel buffer is {} bytes, expected {} for {}x{} {:?}",
                pixels.len(),
                expected,
                width,
                height,
                format
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            pixels: Arc::from(pixels),
            recycled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            pixels: Arc::from(image.into_raw()),
            recycled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Allocated size: width × height × bytes-per-pixel
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Pixel data, or `None` once recycled
    pub fn pixels(&self) -> Option<&[u8]> {
        if self.is_recycled() {
            None
        } else {
            Some(&self.pixels[..])
        }
    }

    /// Mark the underlying image as disposed
    pub fn recycle(&self) {
        self.recycled.store(true, Ordering::Release);
    }

    pub fn is_recycled(&self) -> bool {
        self.recycled.load(Ordering::Acquire)
    }

    /// Compare dimensions and pixel content
    pub fn same_pixels(&self, other: &PixelBuffer) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && match (self.pixels(), other.pixels()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
    }

    /// Convert to an RGBA image, `None` once recycled
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let pixels = self.pixels()?.to_vec();
        let image = match self.format {
            PixelFormat::Rgba8 => DynamicImage::ImageRgba8(RgbaImage::from_raw(
                self.width,
                self.height,
                pixels,
            )?),
            PixelFormat::Rgb8 => {
                DynamicImage::ImageRgb8(RgbImage::from_raw(self.width, self.height, pixels)?)
            }
            PixelFormat::Gray8 => {
                DynamicImage::ImageLuma8(GrayImage::from_raw(self.width, self.height, pixels)?)
            }
        };
        Some(image.to_rgba8())
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("recycled", &self.is_recycled())
            .finish()
    }
}

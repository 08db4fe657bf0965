//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scanshelf::document::PageRenderer;
use scanshelf::formats::MupdfRenderer;
use scanshelf::store::FileDocumentStore;
use tempfile::TempDir;

/// Page size in points of every fixture PDF page
pub const PAGE_WIDTH: u32 = 200;
pub const PAGE_HEIGHT: u32 = 100;

/// Minimal PDF with `pages` empty pages and an optional /Info title
pub fn pdf_bytes(pages: usize, title: Option<&str>) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages)
                .map(|i| format!("{} 0 R", i + 3))
                .collect::<Vec<_>>()
                .join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << >> >>",
            PAGE_WIDTH, PAGE_HEIGHT
        ));
    }
    let info = title.map(|title| {
        objects.push(format!("<< /Title ({}) >>", title));
        objects.len()
    });

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    let info = info
        .map(|n| format!(" /Info {} 0 R", n))
        .unwrap_or_default();
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R{} >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            info,
            xref
        )
        .as_bytes(),
    );
    out
}

pub fn write_pdf(dir: &Path, name: &str, pages: usize, title: Option<&str>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, pdf_bytes(pages, title)).unwrap();
    path
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, png_bytes(width, height)).unwrap();
    path
}

pub fn renderer() -> Arc<dyn PageRenderer> {
    Arc::new(MupdfRenderer::new())
}

/// Fresh store over a temp directory
pub fn store() -> (TempDir, FileDocumentStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = FileDocumentStore::open(temp_dir.path(), renderer()).unwrap();
    (temp_dir, store)
}

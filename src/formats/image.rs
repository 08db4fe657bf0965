//! Image page decoding
//!
//! Image documents have exactly one page: the file itself.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use crate::document::{DocumentError, DocumentResult, DocumentSource, PixelBuffer};

/// Decode an image resource into an RGBA buffer
///
/// Images larger than `max_dimension` on either side are downscaled,
/// preserving aspect ratio.
pub fn decode(source: &DocumentSource, max_dimension: Option<u32>) -> DocumentResult<PixelBuffer> {
    let image = load(source)?;

    let image = match max_dimension {
        Some(max) if max > 0 && (image.width() > max || image.height() > max) => {
            image.resize(max, max, FilterType::Triangle)
        }
        _ => image,
    };

    Ok(PixelBuffer::from_rgba_image(image.to_rgba8()))
}

/// Read only the header and report the dimensions
pub fn probe(source: &DocumentSource) -> DocumentResult<(u32, u32)> {
    let dimensions = match source {
        DocumentSource::Path(path) => ImageReader::open(path)
            .map_err(|e| DocumentError::io_at(path, e))?
            .with_guessed_format()
            .map_err(|e| DocumentError::io_at(path, e))?
            .into_dimensions()?,
        DocumentSource::Bytes { data, .. } => ImageReader::new(Cursor::new(data.as_slice()))
            .with_guessed_format()?
            .into_dimensions()?,
    };

    Ok(dimensions)
}

fn load(source: &DocumentSource) -> DocumentResult<DynamicImage> {
    match source {
        DocumentSource::Path(path) => ImageReader::open(path)
            .map_err(|e| DocumentError::io_at(path, e))?
            .with_guessed_format()
            .map_err(|e| DocumentError::io_at(path, e))?
            .decode()
            .map_err(Into::into),
        DocumentSource::Bytes { data, .. } => {
            image::load_from_memory(data.as_slice()).map_err(Into::into)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_decode_png_bytes() {
        let source = DocumentSource::from_bytes("b.png", png_bytes(4, 3));
        let buffer = decode(&source, None).unwrap();

        assert_eq!((buffer.width(), buffer.height()), (4, 3));
        assert_eq!(buffer.byte_size(), 4 * 3 * 4);
        assert_eq!(&buffer.pixels().unwrap()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_downscales() {
        let source = DocumentSource::from_bytes("big.png", png_bytes(40, 20));
        let buffer = decode(&source, Some(10)).unwrap();

        assert_eq!((buffer.width(), buffer.height()), (10, 5));
    }

    #[test]
    fn test_probe_rejects_garbage() {
        let source = DocumentSource::from_bytes("x.png", b"nope".to_vec());
        assert!(probe(&source).is_err());

        let source = DocumentSource::from_bytes("y.png", png_bytes(2, 2));
        assert_eq!(probe(&source).unwrap(), (2, 2));
    }
}

//! Image encoding and signature sniffing.
//!
//! Two output encodings coexist deliberately: the grid-overlaid image sent
//! to the localization pass is JPEG (lossy is fine — the model only needs to
//! see which cells contain the field), while the final cropped region is PNG
//! so field legibility is not degraded right before the extraction read.

use crate::error::FieldLensError;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Image format detected from leading signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Gif,
    Svg,
    Unknown,
}

impl SniffedFormat {
    /// Detect a format from the first bytes of a buffer.
    pub fn sniff(bytes: &[u8]) -> SniffedFormat {
        if bytes.len() < 4 {
            return SniffedFormat::Unknown;
        }
        match bytes {
            [0xFF, 0xD8, ..] => SniffedFormat::Jpeg,
            [0x89, 0x50, 0x4E, 0x47, ..] => SniffedFormat::Png,
            [0x47, 0x49, 0x46, ..] => SniffedFormat::Gif,
            [0x3C, 0x3F, 0x78, 0x6D, ..] => SniffedFormat::Svg,
            _ => SniffedFormat::Unknown,
        }
    }

    /// MIME type for the sniffed format, or `None` when unknown.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            SniffedFormat::Jpeg => Some("image/jpeg"),
            SniffedFormat::Png => Some("image/png"),
            SniffedFormat::Gif => Some("image/gif"),
            SniffedFormat::Svg => Some("image/svg+xml"),
            SniffedFormat::Unknown => None,
        }
    }
}

/// Reject inputs whose signature is unknown, before they enter the pipeline.
pub fn require_known_format(bytes: &[u8]) -> Result<SniffedFormat, FieldLensError> {
    match SniffedFormat::sniff(bytes) {
        SniffedFormat::Unknown => {
            let mut magic = [0u8; 4];
            for (slot, b) in magic.iter_mut().zip(bytes.iter()) {
                *slot = *b;
            }
            Err(FieldLensError::UnsupportedImageFormat { magic })
        }
        format => Ok(format),
    }
}

/// Encode a bitmap as JPEG bytes.
///
/// The JPEG encoder rejects alpha channels, so the image is flattened to RGB
/// first.
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, FieldLensError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .map_err(|e| FieldLensError::Internal(format!("JPEG encoding failed: {e}")))?;
    debug!("Encoded {}x{} bitmap to {} JPEG bytes", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Encode a bitmap as PNG bytes (lossless).
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, FieldLensError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| FieldLensError::Internal(format!("PNG encoding failed: {e}")))?;
    debug!("Encoded {}x{} bitmap to {} PNG bytes", img.width(), img.height(), buf.len());
    Ok(buf)
}

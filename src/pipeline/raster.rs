//! PDF rasterisation: render every page and stack them into one composite
//! bitmap via pdfium.
//!
//! ## Why a composite?
//!
//! The localization pass asks the model to name grid cells over the whole
//! document at once, so all pages are painted into a single bitmap: width =
//! widest page, height = sum of page heights, each page left-aligned at the
//! cumulative vertical offset of its predecessors.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! thread pool thread so the Tokio workers never stall during CPU-heavy
//! rendering.
//!
//! Cancellation caveat: a blocking task cannot be interrupted. When a caller
//! cancels mid-render the orchestrator stops waiting immediately, but the
//! abandoned render runs to completion on the blocking pool and its bitmap
//! memory is only released when it finishes.
//!
//! The whole composite must fit in memory; at 300 DPI a letter page is
//! roughly 2550x3300 px (~33 MB of RGBA), which bounds the maximum document
//! length this pipeline supports.

use crate::error::FieldLensError;
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Pixel dimensions of a page given its size in points and a target DPI.
///
/// `pixels = points / 72 * dpi`, truncated — the same conversion the overlay
/// and crop stages assume.
pub fn page_pixel_dims(width_pts: f32, height_pts: f32, dpi: u32) -> (u32, u32) {
    let w = (width_pts as f64 / 72.0 * dpi as f64) as u32;
    let h = (height_pts as f64 / 72.0 * dpi as f64) as u32;
    (w, h)
}

/// Renders a PDF document into a single composite bitmap.
///
/// Behind a trait so the rendering backend is swappable without touching the
/// pipeline; [`PdfiumRasterizer`] is the shipped implementation.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render all pages of `pdf` at `dpi` into one vertically stacked bitmap.
    async fn render(&self, pdf: &[u8], dpi: u32) -> Result<DynamicImage, FieldLensError>;
}

/// pdfium-backed rasterizer.
#[derive(Debug, Default)]
pub struct PdfiumRasterizer;

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn render(&self, pdf: &[u8], dpi: u32) -> Result<DynamicImage, FieldLensError> {
        let bytes = pdf.to_vec();
        tokio::task::spawn_blocking(move || render_composite_blocking(&bytes, dpi))
            .await
            .map_err(|e| FieldLensError::Internal(format!("render task panicked: {e}")))?
    }
}

/// Blocking implementation of composite rendering.
fn render_composite_blocking(pdf: &[u8], dpi: u32) -> Result<DynamicImage, FieldLensError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| FieldLensError::ConversionFailure {
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(FieldLensError::ConversionFailure {
            detail: "document has no pages".to_string(),
        });
    }
    info!("PDF loaded: {} pages, rendering at {} DPI", total_pages, dpi);

    // First pass: page geometry only, so the destination can be sized once.
    let mut page_dims = Vec::with_capacity(total_pages);
    let mut max_width = 0u32;
    let mut total_height = 0u32;
    for page in pages.iter() {
        let (w, h) = page_pixel_dims(page.width().value, page.height().value, dpi);
        max_width = max_width.max(w);
        total_height += h;
        page_dims.push((w, h));
    }
    if max_width == 0 || total_height == 0 {
        return Err(FieldLensError::ConversionFailure {
            detail: "document pages have zero extent".to_string(),
        });
    }

    let mut composite = RgbaImage::from_pixel(max_width, total_height, Rgba([255, 255, 255, 255]));

    let mut y_offset = 0u32;
    for (idx, page) in pages.iter().enumerate() {
        let (page_w, page_h) = page_dims[idx];
        let render_config = PdfRenderConfig::new()
            .set_target_width(page_w as i32)
            .set_maximum_height(page_h as i32);

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| FieldLensError::ConversionFailure {
                    detail: format!("page {} rasterisation failed: {e:?}", idx + 1),
                })?;

        let mut rendered = bitmap.as_image();
        if rendered.width() != page_w || rendered.height() != page_h {
            // pdfium may round the secondary dimension; paint at the exact
            // geometry the grid math expects.
            rendered = rendered.resize_exact(page_w, page_h, FilterType::Triangle);
        }
        debug!("Rendered page {} -> {}x{} px at y={}", idx + 1, page_w, page_h, y_offset);

        image::imageops::overlay(&mut composite, &rendered, 0, y_offset as i64);
        y_offset += page_h;
    }

    Ok(DynamicImage::ImageRgba8(composite))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_at_300_dpi() {
        // 8.5 x 11 in = 612 x 792 pt
        let (w, h) = page_pixel_dims(612.0, 792.0, 300);
        assert!((2549..=2551).contains(&w), "width {w}");
        assert!((3299..=3301).contains(&h), "height {h}");
    }

    #[test]
    fn a4_page_at_150_dpi() {
        // A4 = 595.28 x 841.89 pt; truncation, never rounding up
        let (w, h) = page_pixel_dims(595.28, 841.89, 150);
        assert_eq!((w, h), (1240, 1753));
    }

    #[test]
    fn conversion_truncates_fractional_pixels() {
        let (w, _) = page_pixel_dims(100.9, 100.9, 72);
        assert_eq!(w, 100);
    }
}

//! Grid overlay: draw a labeled coordinate grid onto a bitmap.
//!
//! The overlaid image exists purely for model perception — the localization
//! pass names cells by the labels drawn here. Cropping always happens on the
//! original, unlabeled bitmap, so the overlay is a pure function and the
//! input is never mutated.
//!
//! Labeling is deliberately asymmetric: the edge-most columns and rows carry
//! no labels, because a label centred in an edge band would clip against the
//! bitmap boundary. Column letters are drawn twice (near the top and bottom
//! edges), row numbers twice (near the left and right edges), so at least
//! one copy survives whatever content the page puts under it.

use crate::error::FieldLensError;
use crate::pipeline::grid::Grid;
use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::debug;

/// DejaVu Sans Bold, embedded so label rendering needs no system fonts.
const LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans-Bold.ttf");

const GRID_RED: Rgb<u8> = Rgb([255, 0, 0]);
const LINE_THICKNESS: u32 = 2;

/// Fraction of a cell a label may occupy in either dimension.
const LABEL_FILL: f32 = 0.4;

/// Draw an `rows x cols` coordinate grid with labels onto a copy of `bitmap`.
///
/// Returns a new bitmap; the input is untouched and must remain available
/// for cropping. Columns beyond `Z` cannot be lettered, which the config
/// layer rules out before this is reached.
pub fn overlay_grid(
    bitmap: &DynamicImage,
    rows: u32,
    cols: u32,
) -> Result<DynamicImage, FieldLensError> {
    let font = FontRef::try_from_slice(LABEL_FONT)
        .map_err(|e| FieldLensError::Internal(format!("embedded font failed to load: {e}")))?;

    let mut img = bitmap.to_rgb8();
    let (width, height) = (img.width(), img.height());
    let grid = Grid::new(width, height, rows, cols);
    let (cell_w, cell_h) = (grid.cell_width(), grid.cell_height());
    debug!("Overlaying {}x{} grid on {}x{} bitmap ({}x{} px cells)", rows, cols, width, height, cell_w, cell_h);

    draw_grid_lines(&mut img, &grid);

    // Column letters along the top and bottom bands, interior columns only.
    for j in 1..cols.saturating_sub(1) {
        let letter = char::from(b'A' + j as u8).to_string();
        let scale = fit_label_scale(&font, &letter, cell_w, cell_h);
        let center_x = j * cell_w + cell_w / 2;
        draw_centered(&mut img, &font, scale, &letter, center_x, cell_h / 4);
        draw_centered(
            &mut img,
            &font,
            scale,
            &letter,
            center_x,
            height - cell_h / 4,
        );
    }

    // Row numbers along the left and right bands, interior rows only.
    for i in 1..rows.saturating_sub(1) {
        let number = (i + 1).to_string();
        let scale = fit_label_scale(&font, &number, cell_w, cell_h);
        let center_y = i * cell_h + cell_h / 2;
        draw_centered(&mut img, &font, scale, &number, cell_w / 4, center_y);
        draw_centered(
            &mut img,
            &font,
            scale,
            &number,
            width - cell_w / 4,
            center_y,
        );
    }

    Ok(DynamicImage::ImageRgb8(img))
}

/// Draw `cols + 1` vertical and `rows + 1` horizontal lines spanning the
/// bitmap. The outermost lines hug the bitmap edges.
fn draw_grid_lines(img: &mut RgbImage, grid: &Grid) {
    let (width, height) = (img.width(), img.height());
    for j in 0..=grid.cols() {
        let x = (j * grid.cell_width()).min(width - LINE_THICKNESS);
        let rect = Rect::at(x as i32, 0).of_size(LINE_THICKNESS, height);
        draw_filled_rect_mut(img, rect, GRID_RED);
    }
    for i in 0..=grid.rows() {
        let y = (i * grid.cell_height()).min(height - LINE_THICKNESS);
        let rect = Rect::at(0, y as i32).of_size(width, LINE_THICKNESS);
        draw_filled_rect_mut(img, rect, GRID_RED);
    }
}

/// Shrink-search a font scale so `text` occupies at most [`LABEL_FILL`] of a
/// cell in each dimension.
///
/// This is an iterative approximation, not a closed-form fit: start at
/// `min(cell_w, cell_h)` px and shrink in 1 px steps. The floor of 1 px
/// bounds the loop on pathological label/cell combinations.
fn fit_label_scale(font: &FontRef<'_>, text: &str, cell_w: u32, cell_h: u32) -> PxScale {
    let max_w = cell_w as f32 * LABEL_FILL;
    let max_h = cell_h as f32 * LABEL_FILL;
    let mut size = cell_w.min(cell_h) as f32;
    loop {
        let (w, h) = text_size(PxScale::from(size), font, text);
        if (w as f32 <= max_w && h as f32 <= max_h) || size <= 1.0 {
            return PxScale::from(size);
        }
        size -= 1.0;
    }
}

/// Draw `text` centred on `(cx, cy)`.
fn draw_centered(
    img: &mut RgbImage,
    font: &FontRef<'_>,
    scale: PxScale,
    text: &str,
    cx: u32,
    cy: u32,
) {
    let (w, h) = text_size(scale, font, text);
    let x = cx.saturating_sub(w / 2) as i32;
    let y = cy.saturating_sub(h / 2) as i32;
    draw_text_mut(img, GRID_RED, x, y, scale, font, text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn white_bitmap(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn overlay_preserves_dimensions_and_input() {
        let original = white_bitmap(500, 400);
        let labeled = overlay_grid(&original, 10, 10).expect("overlay should succeed");
        assert_eq!((labeled.width(), labeled.height()), (500, 400));
        // Input untouched: still uniformly white.
        assert_eq!(original.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(original.get_pixel(250, 200), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn overlay_draws_red_grid_lines() {
        let labeled = overlay_grid(&white_bitmap(500, 500), 10, 10).unwrap();
        // A point on the second vertical line (x = 50), away from any label.
        let px = labeled.get_pixel(50, 5);
        assert_eq!(px, Rgba([255, 0, 0, 255]));
        // A point on the second horizontal line (y = 50).
        let px = labeled.get_pixel(5, 50);
        assert_eq!(px, Rgba([255, 0, 0, 255]));
        // Cell interiors stay white.
        let px = labeled.get_pixel(25, 25);
        assert_eq!(px, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn overlay_marks_interior_labels_not_edges() {
        let labeled = overlay_grid(&white_bitmap(1000, 1000), 10, 10).unwrap();
        let has_red_off_grid = |x_range: std::ops::Range<u32>, y_range: std::ops::Range<u32>| {
            for x in x_range {
                for y in y_range.clone() {
                    // Skip grid-line pixels.
                    if x % 100 < LINE_THICKNESS || y % 100 < LINE_THICKNESS {
                        continue;
                    }
                    if labeled.get_pixel(x, y) == Rgba([255, 0, 0, 255]) {
                        return true;
                    }
                }
            }
            false
        };
        // Top band of column B (interior) carries a letter.
        assert!(has_red_off_grid(100..200, 0..100), "column B should be labeled");
        // Top band of column A (edge-most) carries no letter.
        assert!(!has_red_off_grid(2..98, 2..98), "column A must stay unlabeled");
    }

    #[test]
    fn label_scale_respects_cell_budget() {
        let font = FontRef::try_from_slice(LABEL_FONT).unwrap();
        let scale = fit_label_scale(&font, "10", 100, 100);
        let (w, h) = text_size(scale, &font, "10");
        assert!(w as f32 <= 40.0, "width {w} exceeds 40% of cell");
        assert!(h as f32 <= 40.0, "height {h} exceeds 40% of cell");
    }

    #[test]
    fn label_scale_bottoms_out_at_floor() {
        let font = FontRef::try_from_slice(LABEL_FONT).unwrap();
        // A 2x2 px cell can never satisfy the 40% budget; the floor stops the search.
        let scale = fit_label_scale(&font, "10", 2, 2);
        assert!(scale.x >= 1.0);
        assert!(scale.x <= 2.0);
    }
}

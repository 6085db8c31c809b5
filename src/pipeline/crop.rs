//! Region cropping: cut the sub-rectangle of the original bitmap covered by
//! a set of grid cells plus a margin of neighboring cells.
//!
//! Cropping always runs on the *original, unlabeled* bitmap. The grid lines
//! and labels only ever existed on the copy sent to the localization pass;
//! carrying them into the extraction crop would put red ink over the very
//! text the model is asked to read.
//!
//! Two margin policies exist because the localization pass is coarse — a
//! field's text may spill into a visually adjacent cell. The circular
//! wide-sides policy is the wider of the two and is what the orchestrator
//! uses for the final high-fidelity crop; the side-neighbor policy serves
//! lighter-weight neighbor-aware contexts.

use crate::error::FieldLensError;
use crate::pipeline::grid::{CellLabel, Grid};
use image::DynamicImage;
use tracing::debug;

/// Margin policy applied around the bounding box of the named cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMargin {
    /// Widen the column range by 1 cell on each side; rows unchanged.
    SideNeighbors,
    /// Widen rows by 1 and columns by 2 cells on each side.
    CircularWideSides,
}

/// Crop `bitmap` to the cells named by `labels`, expanded per `margin`.
///
/// An empty label set or a label outside the `rows x cols` grid is a
/// contract violation and fails fast; the *expansion* clamps at grid edges
/// but the label lookup never does.
pub fn crop_cells(
    bitmap: &DynamicImage,
    rows: u32,
    cols: u32,
    labels: &[CellLabel],
    margin: CropMargin,
) -> Result<DynamicImage, FieldLensError> {
    if rows == 0 || cols == 0 {
        return Err(FieldLensError::InvalidConfig(format!(
            "grid shape {rows}x{cols} has no cells"
        )));
    }
    let grid = Grid::new(bitmap.width(), bitmap.height(), rows, cols);
    let region = grid.region_of(labels)?;
    let expanded = match margin {
        CropMargin::SideNeighbors => region.expand_side_neighbors(&grid),
        CropMargin::CircularWideSides => region.expand_wide_sides(&grid),
    };
    let (x, y, w, h) = expanded.to_pixels(&grid);
    debug!("Cropping {:?} region to {}x{} px at ({}, {})", margin, w, h, x, y);
    Ok(bitmap.crop_imm(x, y, w, h))
}

/// Side-neighbor crop: bounding box widened by one column on each side.
pub fn crop_with_side_neighbors(
    bitmap: &DynamicImage,
    rows: u32,
    cols: u32,
    labels: &[CellLabel],
) -> Result<DynamicImage, FieldLensError> {
    crop_cells(bitmap, rows, cols, labels, CropMargin::SideNeighbors)
}

/// Circular wide-sides crop: bounding box widened by two columns and one
/// row on each side.
pub fn crop_with_wide_sides(
    bitmap: &DynamicImage,
    rows: u32,
    cols: u32,
    labels: &[CellLabel],
) -> Result<DynamicImage, FieldLensError> {
    crop_cells(bitmap, rows, cols, labels, CropMargin::CircularWideSides)
}

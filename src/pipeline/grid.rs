//! Grid geometry: cell labels, cell regions, and neighbor expansion.
//!
//! A grid is a logical partition of a bitmap into `rows x cols` equal cells.
//! Cell width and height use integer division, so up to `cols - 1` (resp.
//! `rows - 1`) remainder pixels at the right/bottom edge belong to no cell.
//! This matches the labels the model is shown and must not be "fixed":
//! correcting it here would shift every crop rectangle relative to the
//! overlay the model reasoned about.
//!
//! Labels are `<ColumnLetter><RowNumber>`: columns lettered `A, B, C…` from
//! the left edge, rows numbered `1..rows` from the top. Parsing is strict;
//! bounds are checked against a concrete grid, never clamped, because an
//! out-of-range label means the localization pass violated its contract.

use crate::error::FieldLensError;
use std::fmt;

/// A parsed grid-cell identifier such as `E5`. Indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellLabel {
    col: u32,
    row: u32,
}

impl CellLabel {
    /// Build a label from 0-based column and row indices.
    ///
    /// Columns beyond `Z` (index 25) have no single-letter spelling and are
    /// rejected at config validation, not here.
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// Parse a label of the form `<letter><number>`, e.g. `E5`.
    pub fn parse(label: &str) -> Result<Self, FieldLensError> {
        let mut chars = label.chars();
        let col_char = chars.next().ok_or_else(|| FieldLensError::InvalidCellLabel {
            label: label.to_string(),
        })?;
        if !col_char.is_ascii_uppercase() {
            return Err(FieldLensError::InvalidCellLabel {
                label: label.to_string(),
            });
        }
        let row_digits = chars.as_str();
        let row_number: u32 = row_digits
            .parse()
            .map_err(|_| FieldLensError::InvalidCellLabel {
                label: label.to_string(),
            })?;
        if row_number == 0 {
            return Err(FieldLensError::InvalidCellLabel {
                label: label.to_string(),
            });
        }
        Ok(Self {
            col: col_char as u32 - 'A' as u32,
            row: row_number - 1,
        })
    }

    /// 0-based column index (`A` = 0).
    pub fn col(&self) -> u32 {
        self.col
    }

    /// 0-based row index (`1` = 0).
    pub fn row(&self) -> u32 {
        self.row
    }
}

impl fmt::Display for CellLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = char::from(b'A' + self.col as u8);
        write!(f, "{}{}", letter, self.row + 1)
    }
}

/// A concrete grid laid over a bitmap of known pixel dimensions.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    rows: u32,
    cols: u32,
    cell_w: u32,
    cell_h: u32,
}

impl Grid {
    /// Partition a `width x height` bitmap into `rows x cols` cells.
    /// Integer division; remainder pixels are absorbed by the far edges.
    ///
    /// `rows` and `cols` must be nonzero; config validation enforces this
    /// for the orchestrator, and the crop entry points check it themselves.
    pub fn new(width: u32, height: u32, rows: u32, cols: u32) -> Self {
        debug_assert!(rows > 0 && cols > 0, "grid shape must be nonzero");
        Self {
            rows,
            cols,
            cell_w: width / cols,
            cell_h: height / rows,
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cell_width(&self) -> u32 {
        self.cell_w
    }

    pub fn cell_height(&self) -> u32 {
        self.cell_h
    }

    /// Bounding region over a set of cell labels.
    ///
    /// The lookup is strict: an empty set or any label outside the grid is a
    /// contract violation. If multiple disjoint regions were returned the
    /// bounding box spans all of them; no clustering is attempted, so
    /// unrelated page area may be over-included.
    pub fn region_of(&self, labels: &[CellLabel]) -> Result<CellRegion, FieldLensError> {
        let first = labels.first().ok_or(FieldLensError::EmptyCellSet)?;
        let mut region = CellRegion {
            min_col: first.col(),
            max_col: first.col(),
            min_row: first.row(),
            max_row: first.row(),
        };
        for label in labels {
            if label.col() >= self.cols || label.row() >= self.rows {
                return Err(FieldLensError::CellLabelOutOfRange {
                    label: label.to_string(),
                    rows: self.rows,
                    cols: self.cols,
                });
            }
            region.min_col = region.min_col.min(label.col());
            region.max_col = region.max_col.max(label.col());
            region.min_row = region.min_row.min(label.row());
            region.max_row = region.max_row.max(label.row());
        }
        Ok(region)
    }
}

/// An inclusive rectangle of grid cells, `(min_col, min_row)..=(max_col, max_row)`.
///
/// Computed fresh per crop; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRegion {
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
}

impl CellRegion {
    /// Side-neighbor expansion: widen the column range by exactly one cell
    /// on each side, clamped to the grid. The row range is NOT expanded.
    ///
    /// Used for lighter-weight neighbor-aware crops where a field's text may
    /// spill into a horizontally adjacent cell.
    pub fn expand_side_neighbors(&self, grid: &Grid) -> CellRegion {
        CellRegion {
            min_col: self.min_col.saturating_sub(1),
            max_col: (self.max_col + 1).min(grid.cols - 1),
            min_row: self.min_row,
            max_row: self.max_row,
        }
    }

    /// Circular wide-sides expansion: widen rows by 1 and columns by 2 on
    /// each side, clamped to the grid.
    ///
    /// The wider margin is used for the final high-fidelity crop — the last
    /// chance to include the true field before the extraction read.
    pub fn expand_wide_sides(&self, grid: &Grid) -> CellRegion {
        CellRegion {
            min_col: self.min_col.saturating_sub(2),
            max_col: (self.max_col + 2).min(grid.cols - 1),
            min_row: self.min_row.saturating_sub(1),
            max_row: (self.max_row + 1).min(grid.rows - 1),
        }
    }

    /// Pixel rectangle `(x, y, width, height)` of this region on the grid's
    /// bitmap. Always inside the bitmap because cell dimensions round down.
    pub fn to_pixels(&self, grid: &Grid) -> (u32, u32, u32, u32) {
        let x = self.min_col * grid.cell_w;
        let y = self.min_row * grid.cell_h;
        let w = (self.max_col - self.min_col + 1) * grid.cell_w;
        let h = (self.max_row - self.min_row + 1) * grid.cell_h;
        (x, y, w, h)
    }
}

/// Parse a batch of label strings, failing on the first malformed entry.
pub fn parse_labels(labels: &[String]) -> Result<Vec<CellLabel>, FieldLensError> {
    labels.iter().map(|s| CellLabel::parse(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_round_trip_full_10x10() {
        for col in 0..10u32 {
            for row in 0..10u32 {
                let label = CellLabel::new(col, row).to_string();
                let parsed = CellLabel::parse(&label).expect("valid label");
                assert_eq!(parsed.col(), col, "label {label}");
                assert_eq!(parsed.row(), row, "label {label}");
                assert_eq!(parsed.to_string(), label);
            }
        }
    }

    #[test]
    fn parse_rejects_malformed_labels() {
        for bad in ["", "5", "a5", "E", "E0", "EE", "E-1", "5E"] {
            assert!(
                matches!(
                    CellLabel::parse(bad),
                    Err(FieldLensError::InvalidCellLabel { .. })
                ),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn region_of_empty_set_is_contract_violation() {
        let grid = Grid::new(1000, 1000, 10, 10);
        assert!(matches!(
            grid.region_of(&[]),
            Err(FieldLensError::EmptyCellSet)
        ));
    }

    #[test]
    fn region_of_out_of_range_label_fails_without_clamping() {
        let grid = Grid::new(1000, 1000, 10, 10);
        // K1 decodes to column 10 on a 10-column grid
        let label = CellLabel::parse("K1").expect("parseable");
        let err = grid.region_of(&[label]).unwrap_err();
        assert!(matches!(
            err,
            FieldLensError::CellLabelOutOfRange { .. }
        ));
        // Same for a row past the bottom edge
        let label = CellLabel::parse("A11").expect("parseable");
        assert!(grid.region_of(&[label]).is_err());
    }

    #[test]
    fn region_spans_disjoint_cells() {
        let grid = Grid::new(1000, 1000, 10, 10);
        let labels = [
            CellLabel::parse("B2").unwrap(),
            CellLabel::parse("H7").unwrap(),
        ];
        let region = grid.region_of(&labels).unwrap();
        assert_eq!(
            region,
            CellRegion {
                min_col: 1,
                max_col: 7,
                min_row: 1,
                max_row: 6
            }
        );
    }

    #[test]
    fn side_neighbors_widen_columns_only() {
        let grid = Grid::new(1000, 1000, 10, 10);
        let region = grid
            .region_of(&[CellLabel::parse("E5").unwrap()])
            .unwrap()
            .expand_side_neighbors(&grid);
        assert_eq!(
            region,
            CellRegion {
                min_col: 3,
                max_col: 5,
                min_row: 4,
                max_row: 4
            }
        );
    }

    #[test]
    fn side_neighbors_clamp_at_grid_edges() {
        let grid = Grid::new(1000, 1000, 10, 10);
        let left = grid
            .region_of(&[CellLabel::parse("A1").unwrap()])
            .unwrap()
            .expand_side_neighbors(&grid);
        assert_eq!(left.min_col, 0);
        assert_eq!(left.max_col, 1);

        let right = grid
            .region_of(&[CellLabel::parse("J1").unwrap()])
            .unwrap()
            .expand_side_neighbors(&grid);
        assert_eq!(right.min_col, 8);
        assert_eq!(right.max_col, 9);
    }

    #[test]
    fn wide_sides_widen_two_cols_one_row() {
        let grid = Grid::new(1000, 1000, 10, 10);
        let region = grid
            .region_of(&[CellLabel::parse("E5").unwrap()])
            .unwrap()
            .expand_wide_sides(&grid);
        assert_eq!(
            region,
            CellRegion {
                min_col: 2,
                max_col: 6,
                min_row: 3,
                max_row: 5
            }
        );
    }

    #[test]
    fn wide_sides_clamp_at_corners() {
        let grid = Grid::new(1000, 1000, 10, 10);
        let region = grid
            .region_of(&[CellLabel::parse("A1").unwrap()])
            .unwrap()
            .expand_wide_sides(&grid);
        assert_eq!(
            region,
            CellRegion {
                min_col: 0,
                max_col: 2,
                min_row: 0,
                max_row: 1
            }
        );
    }

    #[test]
    fn pixel_rect_uses_integer_cell_sizes() {
        // 1003 px / 10 cols = 100 px cells; 3 remainder px absorbed at the edge.
        let grid = Grid::new(1003, 1003, 10, 10);
        assert_eq!(grid.cell_width(), 100);
        let region = grid
            .region_of(&[CellLabel::parse("J10").unwrap()])
            .unwrap();
        let (x, y, w, h) = region.to_pixels(&grid);
        assert_eq!((x, y, w, h), (900, 900, 100, 100));
        // The far-edge remainder is never part of any cell rectangle.
        assert!(x + w <= 1003);
    }

    #[test]
    fn parse_labels_collects_or_fails() {
        let good = vec!["E5".to_string(), "F5".to_string()];
        assert_eq!(parse_labels(&good).unwrap().len(), 2);
        let bad = vec!["E5".to_string(), "??".to_string()];
        assert!(parse_labels(&bad).is_err());
    }
}

//! Orientation correction from EXIF metadata.
//!
//! Phone photos and some scanner outputs store the image rotated, with the
//! display rotation recorded in EXIF tag 0x0112. All grid geometry is
//! defined relative to the *displayed* orientation, so correction must run
//! before any cell math; otherwise a 90°-rotated scan would put `A1` in the
//! wrong corner of every crop.
//!
//! The corrected output is a decoded bitmap: re-encoding it never emits an
//! orientation tag, so downstream consumers cannot double-correct.

use crate::error::FieldLensError;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Read EXIF orientation (tag 0x0112) from raw image bytes.
/// Returns 1 (normal) when no EXIF data or no orientation tag is present.
pub fn read_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };
    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation value to a bitmap.
///
/// Only the rotation values are handled (1=normal, 3=180°, 6=90° CW,
/// 8=270° CW); mirrored variants and unknown values pass through unchanged.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        3 => img.rotate180(),
        6 => img.rotate90(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Decode raw image bytes and correct their orientation.
///
/// The returned bitmap is upright with respect to display orientation and
/// carries no metadata.
pub fn normalize(bytes: &[u8]) -> Result<DynamicImage, FieldLensError> {
    let orientation = read_orientation(bytes);
    let img = image::load_from_memory(bytes).map_err(|e| FieldLensError::ConversionFailure {
        detail: format!("image decode failed: {e}"),
    })?;
    if orientation != 1 {
        debug!("Correcting EXIF orientation {orientation}");
    }
    Ok(apply_orientation(img, orientation))
}

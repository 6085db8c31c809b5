//! Pipeline stages for grid-guided field extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. the rendering backend) without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! PDF ──▶ raster ──▶ overlay ──▶ gateway (localize) ──▶ crop ──▶ gateway (extract)
//!         (pdfium)   (labeled     cell labels            original   typed JSON
//!                     grid copy)                         bitmap
//! ```
//!
//! 1. [`raster`]  — render all pages into one composite bitmap; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`orient`]  — EXIF orientation correction for raw image inputs; must
//!    run before any grid math
//! 3. [`grid`]    — cell labels, bounding regions, neighbor expansion
//! 4. [`overlay`] — draw the labeled grid the localization pass will see
//! 5. [`crop`]    — cut the located region out of the *original* bitmap
//! 6. [`encode`]  — JPEG/PNG encoding and input-format sniffing

pub mod crop;
pub mod encode;
pub mod grid;
pub mod orient;
pub mod overlay;
pub mod raster;

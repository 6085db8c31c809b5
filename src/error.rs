//! Error types for the fieldlens library.
//!
//! One deliberate split runs through the whole crate: a localization pass
//! that finds no cells is **not** an error. It is a valid terminal outcome
//! modelled as [`crate::extract::ExtractionOutcome::NotLocated`], so
//! `FieldLensError` only covers conditions where the pipeline genuinely
//! cannot produce a result.
//!
//! Geometry errors (`EmptyCellSet`, `CellLabelOutOfRange`) are contract
//! violations: they indicate a broken upstream stage (usually the model
//! returning labels outside the advertised grid), so they fail fast with no
//! recovery attempt. Gateway failures are surfaced as-is; retry policy, if
//! any, belongs to the caller.

use thiserror::Error;

/// All errors returned by the fieldlens library.
#[derive(Debug, Error)]
pub enum FieldLensError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// PDF rendering produced zero pages or an unreadable document.
    /// Fatal and never retried: the input is presumed malformed.
    #[error("PDF conversion failed: {detail}")]
    ConversionFailure { detail: String },

    /// Image signature sniffing yielded no known format.
    /// `magic` holds the first bytes of the input, zero-padded.
    #[error("Unsupported image format (magic bytes {magic:02X?})\nSupported: JPEG, PNG, GIF.")]
    UnsupportedImageFormat { magic: [u8; 4] },

    // ── Grid contract violations ──────────────────────────────────────────
    /// Cropping was invoked with no cell labels. Callers must treat an empty
    /// localization result as "field not found" and skip cropping entirely.
    #[error("Cannot crop with an empty cell-label set; check for a not-located outcome upstream")]
    EmptyCellSet,

    /// A cell label decoded to a column or row outside the grid.
    #[error("Cell label '{label}' is outside the {rows}x{cols} grid")]
    CellLabelOutOfRange { label: String, rows: u32, cols: u32 },

    /// A cell label did not match the `<letter><number>` form.
    #[error("Malformed cell label '{label}': expected a column letter followed by a 1-based row number (e.g. E5)")]
    InvalidCellLabel { label: String },

    // ── Model gateway errors ──────────────────────────────────────────────
    /// Transport-level failure talking to the model gateway.
    #[error("Model gateway request failed: {detail}")]
    Gateway { detail: String },

    /// The gateway answered with a non-success HTTP status.
    #[error("Model gateway returned HTTP {status}: {body}")]
    GatewayStatus { status: u16, body: String },

    /// The extraction pass returned JSON that does not conform to the
    /// requested schema. The raw model text is attached for diagnostics;
    /// it is never silently coerced.
    #[error("Model output does not match the requested schema: {detail}\nRaw output: {raw}")]
    ExtractionMalformed { raw: String, detail: String },

    // ── Document analysis errors ──────────────────────────────────────────
    /// The document-analysis service rejected or failed the request.
    #[error("Document analysis failed: {detail}")]
    Analysis { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Control flow ──────────────────────────────────────────────────────
    /// The caller's cancellation token fired before the pipeline finished.
    #[error("Extraction cancelled by caller")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

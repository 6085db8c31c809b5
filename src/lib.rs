//! # fieldlens
//!
//! Extract individual fields from scanned documents using Vision Language
//! Models (VLMs) and a two-pass grid protocol.
//!
//! ## Why this crate?
//!
//! Asking a VLM for one field on a full scanned form wastes most of its
//! attention on irrelevant page area and degrades accuracy on dense
//! layouts. Instead this crate first shows the model the whole document
//! under a labeled coordinate grid and asks *where* the field is, then
//! crops that region (with a safety margin) from the clean original and
//! asks the model to read *only* that crop into a caller-defined JSON
//! schema.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Raster    all pages → one composite bitmap (pdfium, spawn_blocking)
//!  │               images: EXIF-normalize instead of rendering
//!  ├─ 2. Overlay   draw labeled N×M grid on a copy (red lines, lettered
//!  │               columns, numbered rows)
//!  ├─ 3. Localize  VLM names the grid cells containing the field (JPEG)
//!  ├─ 4. Crop      widen the named region, cut it from the clean original
//!  └─ 5. Extract   VLM fills the caller's JSON schema from the crop (PNG)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fieldlens::{
//!     ExtractionConfig, ExtractionOutcome, ExtractionTarget, FieldExtractor,
//!     FieldQuery, OpenAiGateway,
//! };
//! use serde::Deserialize;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Deserialize)]
//! struct Iban {
//!     iban: String,
//! }
//!
//! impl ExtractionTarget for Iban {
//!     fn schema_name() -> &'static str {
//!         "iban"
//!     }
//!     fn schema() -> Value {
//!         json!({
//!             "type": "object",
//!             "properties": { "iban": { "type": "string" } },
//!             "required": ["iban"],
//!             "additionalProperties": false
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder(std::env::var("OPENAI_API_KEY")?).build()?;
//!     let gateway = Arc::new(OpenAiGateway::new(&config)?);
//!     let extractor = FieldExtractor::new(gateway, config);
//!
//!     let pdf = std::fs::read("transfer-form.pdf")?;
//!     let query = FieldQuery::new("the IBAN of the beneficiary");
//!     match extractor
//!         .extract_from_pdf::<Iban>(&pdf, &query, &CancellationToken::new())
//!         .await?
//!     {
//!         ExtractionOutcome::Extracted { value, cells } => {
//!             println!("{} (found in {:?})", value.iban, cells);
//!         }
//!         ExtractionOutcome::NotLocated => println!("field not on this document"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `fieldlens` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! fieldlens = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{AnalysisResult, AnalyzedField, DocumentAnalysisClient};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::FieldLensError;
pub use extract::{ExtractionOutcome, FieldExtractor, FieldQuery};
pub use gateway::{
    ChatMessage, DetailLevel, ExtractionTarget, GatewayRequest, ImageAttachment, ModelGateway,
    OpenAiGateway, Role, SchemaFormat,
};
pub use pipeline::grid::CellLabel;
pub use pipeline::raster::{PdfiumRasterizer, Rasterizer};

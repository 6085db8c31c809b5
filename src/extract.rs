//! Two-pass extraction orchestrator.
//!
//! Pass 1 (localization): the composite bitmap gets a labeled grid overlay,
//! is JPEG-encoded, and the model is asked which cells contain the field.
//! Pass 2 (extraction): the named region — widened by the wide-sides margin
//! and cut from the *original* bitmap — is PNG-encoded and the model fills
//! in the caller's schema from that crop alone.
//!
//! An empty localization answer is a valid outcome
//! ([`ExtractionOutcome::NotLocated`]), not an error: the field may simply
//! not be on the document. Malformed model JSON, on the other hand, is
//! always an error carrying the raw output; nothing is silently coerced.

use crate::config::ExtractionConfig;
use crate::error::FieldLensError;
use crate::gateway::{
    ChatMessage, DetailLevel, ExtractionTarget, GatewayRequest, ImageAttachment, ModelGateway,
    SchemaFormat,
};
use crate::pipeline::crop::crop_with_wide_sides;
use crate::pipeline::encode::{encode_jpeg, encode_png, require_known_format};
use crate::pipeline::grid::{parse_labels, CellLabel};
use crate::pipeline::orient;
use crate::pipeline::overlay::overlay_grid;
use crate::pipeline::raster::{PdfiumRasterizer, Rasterizer};
use crate::prompts;
use image::DynamicImage;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What to look for and how to ask for it.
#[derive(Debug, Clone)]
pub struct FieldQuery {
    /// Short description of the field, used by the localization pass
    /// (e.g. "the IBAN of the account holder").
    pub description: String,
    /// User prompt for the extraction pass. Defaults to asking for the
    /// described field verbatim.
    pub task_prompt: Option<String>,
    /// System prompt override for the extraction pass.
    pub system_prompt: Option<String>,
}

impl FieldQuery {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            task_prompt: None,
            system_prompt: None,
        }
    }

    pub fn with_task_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.task_prompt = Some(prompt.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Terminal result of an extraction run.
#[derive(Debug)]
pub enum ExtractionOutcome<T> {
    /// The field was located and the extraction pass produced a value.
    Extracted {
        value: T,
        /// The cells the localization pass named, before margin expansion.
        cells: Vec<CellLabel>,
    },
    /// The localization pass found no cells containing the field.
    NotLocated,
}

/// Localization answer shape. `cell_labels` is nullable by contract: the
/// model answers `null` (or an empty list) when the field is absent.
#[derive(Debug, Deserialize)]
struct GridCells {
    cell_labels: Option<Vec<String>>,
}

/// Schema for the localization pass, with every allowed label enumerated so
/// the model cannot invent cells outside the grid it was shown.
fn grid_cells_schema(rows: u32, cols: u32) -> Value {
    json!({
        "type": "object",
        "properties": {
            "cell_labels": {
                "type": ["array", "null"],
                "items": { "type": "string" },
                "description": prompts::cell_label_description(rows, cols)
            }
        },
        "required": ["cell_labels"],
        "additionalProperties": false
    })
}

/// Orchestrates the two-pass protocol over a gateway and a rasterizer.
pub struct FieldExtractor {
    gateway: Arc<dyn ModelGateway>,
    rasterizer: Arc<dyn Rasterizer>,
    config: ExtractionConfig,
}

impl FieldExtractor {
    /// Build an extractor with the default pdfium rasterizer.
    pub fn new(gateway: Arc<dyn ModelGateway>, config: ExtractionConfig) -> Self {
        Self {
            gateway,
            rasterizer: Arc::new(PdfiumRasterizer),
            config,
        }
    }

    /// Build an extractor with a custom rasterizer (tests, alternative
    /// rendering backends).
    pub fn with_rasterizer(
        gateway: Arc<dyn ModelGateway>,
        rasterizer: Arc<dyn Rasterizer>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            gateway,
            rasterizer,
            config,
        }
    }

    /// Extract a field from a PDF document.
    pub async fn extract_from_pdf<T: ExtractionTarget>(
        &self,
        pdf: &[u8],
        query: &FieldQuery,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome<T>, FieldLensError> {
        if cancel.is_cancelled() {
            return Err(FieldLensError::Cancelled);
        }
        let bitmap = tokio::select! {
            _ = cancel.cancelled() => return Err(FieldLensError::Cancelled),
            rendered = self.rasterizer.render(pdf, self.config.dpi) => rendered?,
        };
        self.extract_from_bitmap(&bitmap, query, cancel).await
    }

    /// Extract a field from an already-rasterised image (JPEG, PNG or GIF).
    ///
    /// The image is signature-checked, decoded, and EXIF-normalized before
    /// any grid math runs; an EXIF-rotated photo would otherwise misalign
    /// every crop rectangle.
    pub async fn extract_from_image<T: ExtractionTarget>(
        &self,
        bytes: &[u8],
        query: &FieldQuery,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome<T>, FieldLensError> {
        require_known_format(bytes)?;
        let bitmap = orient::normalize(bytes)?;
        self.extract_from_bitmap(&bitmap, query, cancel).await
    }

    /// Run the two-pass protocol on a decoded, upright bitmap.
    pub async fn extract_from_bitmap<T: ExtractionTarget>(
        &self,
        bitmap: &DynamicImage,
        query: &FieldQuery,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome<T>, FieldLensError> {
        if cancel.is_cancelled() {
            return Err(FieldLensError::Cancelled);
        }
        let (rows, cols) = (self.config.grid_rows, self.config.grid_cols);

        // Pass 1: coarse localization over the grid-overlaid copy.
        let labeled = overlay_grid(bitmap, rows, cols)?;
        let jpeg = encode_jpeg(&labeled)?;
        let localization = GatewayRequest {
            messages: vec![
                ChatMessage::system(prompts::LOCALIZATION_SYSTEM_PROMPT),
                ChatMessage::user(prompts::localization_prompt(&query.description)),
            ],
            image: Some(ImageAttachment {
                bytes: jpeg,
                media_type: "image/jpeg",
                detail: DetailLevel::High,
            }),
            response_schema: Some(SchemaFormat {
                name: "grid_extraction_labels".to_string(),
                schema: grid_cells_schema(rows, cols),
            }),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let raw = self.complete_cancellable(localization, cancel).await?;
        let grid_cells: GridCells =
            serde_json::from_str(&raw).map_err(|e| FieldLensError::ExtractionMalformed {
                raw: raw.clone(),
                detail: format!("localization answer: {e}"),
            })?;

        let label_strings = match grid_cells.cell_labels {
            Some(labels) if !labels.is_empty() => labels,
            _ => {
                info!("Field '{}' not located on the document", query.description);
                return Ok(ExtractionOutcome::NotLocated);
            }
        };
        let cells = parse_labels(&label_strings)?;
        debug!("Field '{}' located in cells {:?}", query.description, label_strings);

        // Pass 2: precise extraction from the widened crop of the original.
        let cropped = crop_with_wide_sides(bitmap, rows, cols, &cells)?;
        let png = encode_png(&cropped)?;
        let system_prompt = query
            .system_prompt
            .as_deref()
            .unwrap_or(prompts::DEFAULT_EXTRACTION_SYSTEM_PROMPT);
        let task_prompt = match &query.task_prompt {
            Some(prompt) => prompt.clone(),
            None => format!("Extract {} from the document region.", query.description),
        };
        let extraction = GatewayRequest {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(task_prompt),
            ],
            image: Some(ImageAttachment {
                bytes: png,
                media_type: "image/png",
                // The crop is small, but its text is the whole point of the
                // read; both passes always run at high detail.
                detail: DetailLevel::High,
            }),
            response_schema: Some(SchemaFormat {
                name: T::schema_name().to_string(),
                schema: T::schema(),
            }),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let raw = self.complete_cancellable(extraction, cancel).await?;
        let value: T =
            serde_json::from_str(&raw).map_err(|e| FieldLensError::ExtractionMalformed {
                raw: raw.clone(),
                detail: e.to_string(),
            })?;

        Ok(ExtractionOutcome::Extracted { value, cells })
    }

    /// Gateway call raced against the cancellation token.
    async fn complete_cancellable(
        &self,
        request: GatewayRequest,
        cancel: &CancellationToken,
    ) -> Result<String, FieldLensError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(FieldLensError::Cancelled),
            answer = self.gateway.complete(request) => answer,
        }
    }
}

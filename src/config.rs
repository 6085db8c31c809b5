//! Extraction configuration with a builder and validation.
//!
//! Every knob has a default good enough for scanned bank forms; the builder
//! exists so callers override only what they need. `build()` validates the
//! combination once, so the pipeline never has to re-check ranges mid-flight.

use crate::error::FieldLensError;

/// Default render resolution. 300 DPI keeps small print legible without
/// blowing up the composite bitmap.
pub const DEFAULT_DPI: u32 = 300;

/// Lowest DPI worth rendering at; below this, form text is unreadable.
pub const MIN_DPI: u32 = 72;

/// Highest supported DPI; beyond this the composite bitmap for a multi-page
/// document gets too large to hold and upload.
pub const MAX_DPI: u32 = 400;

/// Default grid shape for the localization pass.
pub const DEFAULT_GRID_ROWS: u32 = 10;
pub const DEFAULT_GRID_COLS: u32 = 10;

/// Column labels are single letters, so the grid can be at most 26 wide.
pub const MAX_GRID_COLS: u32 = 26;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Validated configuration for the extraction pipeline.
///
/// Construct via [`ExtractionConfig::builder`]; the fields are public so the
/// pipeline and gateway can read them without accessors.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Render resolution for PDF rasterisation.
    pub dpi: u32,
    /// Grid rows for the localization overlay.
    pub grid_rows: u32,
    /// Grid columns for the localization overlay (max 26).
    pub grid_cols: u32,
    /// Sampling temperature for both model passes.
    pub temperature: f32,
    /// Optional completion token cap.
    pub max_tokens: Option<u32>,
    /// Per-request HTTP timeout.
    pub api_timeout_secs: u64,
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

impl ExtractionConfig {
    /// Start building a configuration with the given API key.
    pub fn builder(api_key: impl Into<String>) -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            dpi: DEFAULT_DPI,
            grid_rows: DEFAULT_GRID_ROWS,
            grid_cols: DEFAULT_GRID_COLS,
            temperature: 0.0,
            max_tokens: None,
            api_timeout_secs: DEFAULT_TIMEOUT_SECS,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug, Clone)]
pub struct ExtractionConfigBuilder {
    dpi: u32,
    grid_rows: u32,
    grid_cols: u32,
    temperature: f32,
    max_tokens: Option<u32>,
    api_timeout_secs: u64,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ExtractionConfigBuilder {
    /// Render resolution, clamped to the supported 72-400 DPI range.
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.clamp(MIN_DPI, MAX_DPI);
        self
    }

    /// Grid shape for the localization overlay.
    pub fn grid(mut self, rows: u32, cols: u32) -> Self {
        self.grid_rows = rows;
        self.grid_cols = cols;
        self
    }

    /// Sampling temperature. Leave at 0 unless you have a reason not to.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap on completion tokens per model call.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Per-request HTTP timeout in seconds.
    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.api_timeout_secs = secs;
        self
    }

    /// Override the chat-completions endpoint (e.g. a proxy or a
    /// compatible self-hosted server).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Model identifier; must be vision-capable.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<ExtractionConfig, FieldLensError> {
        if self.api_key.is_empty() {
            return Err(FieldLensError::InvalidConfig(
                "API key must not be empty".to_string(),
            ));
        }
        if self.grid_rows < 2 {
            return Err(FieldLensError::InvalidConfig(format!(
                "grid must have at least 2 rows, got {}",
                self.grid_rows
            )));
        }
        if self.grid_cols < 2 {
            return Err(FieldLensError::InvalidConfig(format!(
                "grid must have at least 2 columns, got {}",
                self.grid_cols
            )));
        }
        if self.grid_cols > MAX_GRID_COLS {
            return Err(FieldLensError::InvalidConfig(format!(
                "grid columns limited to {} (single-letter labels), got {}",
                MAX_GRID_COLS, self.grid_cols
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(FieldLensError::InvalidConfig(format!(
                "temperature must be within 0.0-2.0, got {}",
                self.temperature
            )));
        }
        if self.api_timeout_secs == 0 {
            return Err(FieldLensError::InvalidConfig(
                "API timeout must be nonzero".to_string(),
            ));
        }
        Ok(ExtractionConfig {
            dpi: self.dpi,
            grid_rows: self.grid_rows,
            grid_cols: self.grid_cols,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            api_timeout_secs: self.api_timeout_secs,
            endpoint: self.endpoint,
            api_key: self.api_key,
            model: self.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ExtractionConfig::builder("sk-test").build().unwrap();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.grid_rows, 10);
        assert_eq!(config.grid_cols, 10);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.api_timeout_secs, 60);
    }

    #[test]
    fn dpi_is_clamped_not_rejected() {
        let config = ExtractionConfig::builder("sk-test").dpi(1200).build().unwrap();
        assert_eq!(config.dpi, MAX_DPI);
        let config = ExtractionConfig::builder("sk-test").dpi(10).build().unwrap();
        assert_eq!(config.dpi, MIN_DPI);
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = ExtractionConfig::builder("").build().unwrap_err();
        assert!(matches!(err, FieldLensError::InvalidConfig(_)));
    }

    #[test]
    fn grid_wider_than_alphabet_is_rejected() {
        let err = ExtractionConfig::builder("sk-test")
            .grid(10, 27)
            .build()
            .unwrap_err();
        assert!(matches!(err, FieldLensError::InvalidConfig(_)));
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        let err = ExtractionConfig::builder("sk-test")
            .grid(1, 10)
            .build()
            .unwrap_err();
        assert!(matches!(err, FieldLensError::InvalidConfig(_)));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let err = ExtractionConfig::builder("sk-test")
            .temperature(3.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, FieldLensError::InvalidConfig(_)));
    }

    #[test]
    fn overrides_apply() {
        let config = ExtractionConfig::builder("sk-test")
            .grid(8, 12)
            .model("gpt-4o-mini")
            .endpoint("http://localhost:8080/v1/chat/completions")
            .max_tokens(2048)
            .build()
            .unwrap();
        assert_eq!((config.grid_rows, config.grid_cols), (8, 12));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, Some(2048));
    }
}

//! CLI binary for fieldlens.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs the two-pass extraction, and prints the result
//! as JSON on stdout. Logs go to stderr so stdout stays pipeable.

use anyhow::{Context, Result};
use clap::Parser;
use fieldlens::{
    ExtractionConfig, ExtractionOutcome, ExtractionTarget, FieldExtractor, FieldQuery,
    OpenAiGateway,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "fieldlens",
    version,
    about = "Extract a field from a scanned document with a vision model",
    long_about = "Locates a named field on a scanned PDF or image via a labeled \
                  coordinate grid, crops the region, and reads the value with a \
                  second vision-model pass. Prints a JSON object on stdout."
)]
struct Cli {
    /// Input document: a PDF, or a JPEG/PNG/GIF scan.
    input: PathBuf,

    /// Description of the field to find, e.g. "the IBAN of the beneficiary".
    #[arg(long)]
    field: String,

    /// Extraction prompt override; defaults to asking for the field verbatim.
    #[arg(long, env = "FIELDLENS_PROMPT")]
    prompt: Option<String>,

    /// System prompt override for the extraction pass.
    #[arg(long, env = "FIELDLENS_SYSTEM_PROMPT")]
    system_prompt: Option<String>,

    /// Vision-capable model identifier.
    #[arg(long, env = "FIELDLENS_MODEL", default_value = "gpt-4o")]
    model: String,

    /// API key for the model endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Chat-completions endpoint URL.
    #[arg(
        long,
        env = "FIELDLENS_ENDPOINT",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    endpoint: String,

    /// Render resolution for PDF input (72-400).
    #[arg(long, env = "FIELDLENS_DPI", default_value_t = 300)]
    dpi: u32,

    /// Grid rows for the localization overlay.
    #[arg(long, env = "FIELDLENS_ROWS", default_value_t = 10)]
    rows: u32,

    /// Grid columns for the localization overlay (max 26).
    #[arg(long, env = "FIELDLENS_COLS", default_value_t = 10)]
    cols: u32,

    /// Per-request API timeout in seconds.
    #[arg(long, env = "FIELDLENS_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FIELDLENS_VERBOSE")]
    verbose: bool,
}

/// Generic single-value target used when the caller gives no schema of
/// their own: the model answers `{"value": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
struct FieldValue {
    value: String,
}

impl ExtractionTarget for FieldValue {
    fn schema_name() -> &'static str {
        "field_value"
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "value": {
                    "type": "string",
                    "description": "The field's text exactly as written on the document"
                }
            },
            "required": ["value"],
            "additionalProperties": false
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ExtractionConfig::builder(cli.api_key)
        .dpi(cli.dpi)
        .grid(cli.rows, cli.cols)
        .model(cli.model)
        .endpoint(cli.endpoint)
        .api_timeout_secs(cli.api_timeout)
        .build()?;
    let gateway = Arc::new(OpenAiGateway::new(&config)?);
    let extractor = FieldExtractor::new(gateway, config);

    let mut query = FieldQuery::new(&cli.field);
    if let Some(prompt) = cli.prompt {
        query = query.with_task_prompt(prompt);
    }
    if let Some(system_prompt) = cli.system_prompt {
        query = query.with_system_prompt(system_prompt);
    }

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    // Ctrl-C cancels both model passes mid-flight.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let outcome = if bytes.starts_with(b"%PDF") {
        extractor
            .extract_from_pdf::<FieldValue>(&bytes, &query, &cancel)
            .await?
    } else {
        extractor
            .extract_from_image::<FieldValue>(&bytes, &query, &cancel)
            .await?
    };

    match outcome {
        ExtractionOutcome::Extracted { value, cells } => {
            let cells: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "located": true,
                    "cells": cells,
                    "value": value.value,
                }))?
            );
        }
        ExtractionOutcome::NotLocated => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "located": false,
                    "cells": [],
                    "value": null,
                }))?
            );
        }
    }
    Ok(())
}

//! One-shot extraction entry points.
//!
//! ## Why one-shot vs. session?
//!
//! This module provides the simpler API: run the whole pipeline once and
//! return the [`ExtractionOutput`]. Use [`crate::session::ExtractionSession`]
//! instead when a Presentation Layer needs the intermediate states
//! (FileSelected → Recognizing → Extracting → …) and the 0–100 progress
//! value; both paths share the stage helpers below, so the semantics are
//! identical.

use crate::config::{ExtractionConfig, ParsePolicy};
use crate::error::ExtractError;
use crate::pipeline::llm::{ExtractionClient, OpenAiCompatClient};
use crate::pipeline::ocr::{OcrEngine, TesseractCli};
use crate::pipeline::{input::SourceDocument, parse};
use crate::prompts;
use crate::record::{ExtractionOutput, ExtractionStats};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

/// Extract the structured record from a card image file.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` on success. Under the default
/// [`ParsePolicy::Lenient`] this includes runs whose completion failed to
/// parse — check `output.record` / `output.parse_error`.
///
/// # Errors
/// Returns `Err(ExtractError)` for fatal errors: unreadable file, OCR
/// failure, service failure, or (strict policy only) a parse failure.
pub async fn extract(
    input: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let document = SourceDocument::from_path(input).await?;
    extract_document(document, config).await
}

/// Extract from in-memory image bytes (media type sniffed from content).
pub async fn extract_from_bytes(
    bytes: Vec<u8>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let document = SourceDocument::from_bytes(bytes)?;
    extract_document(document, config).await
}

/// Extract from an already-constructed [`SourceDocument`].
pub async fn extract_document(
    document: SourceDocument,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    info!(
        "Starting extraction ({}, {} bytes)",
        document.media_type(),
        document.bytes().len()
    );

    let ocr = resolve_ocr(config);
    let client = resolve_client(config);

    // ── Step 1: OCR ──────────────────────────────────────────────────────
    let (recognized_text, ocr_duration_ms) = run_ocr(&ocr, &document, config).await?;
    info!(
        "OCR complete: {} chars in {}ms",
        recognized_text.len(),
        ocr_duration_ms
    );

    // ── Step 2: Prompt ───────────────────────────────────────────────────
    let prompt = prompts::build_prompt(&recognized_text);

    // ── Step 3: Completion ───────────────────────────────────────────────
    let (raw_response, llm_duration_ms) = run_completion(&client, &prompt, config).await?;
    info!(
        "Completion received: {} chars in {}ms",
        raw_response.len(),
        llm_duration_ms
    );

    // ── Step 4: Parse ────────────────────────────────────────────────────
    let (record, parse_error) = match parse::parse_record(&raw_response) {
        Ok(record) => {
            info!("Parsed record with {}/9 fields", record.filled_count());
            (Some(record), None)
        }
        Err(e) => match config.parse_policy {
            ParsePolicy::Lenient => {
                warn!("Field extraction failed, keeping OCR result: {e}");
                (None, Some(e))
            }
            ParsePolicy::Strict => return Err(ExtractError::Parse(e)),
        },
    };

    let stats = ExtractionStats {
        ocr_duration_ms,
        llm_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        recognized_chars: recognized_text.len(),
        response_chars: raw_response.len(),
    };

    Ok(ExtractionOutput {
        record,
        recognized_text,
        parse_error,
        stats,
    })
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract(input, config))
}

// ── Stage helpers (shared with the session orchestrator) ─────────────────

/// Resolve the OCR engine: the injected one, or the Tesseract CLI adapter.
pub(crate) fn resolve_ocr(config: &ExtractionConfig) -> Arc<dyn OcrEngine> {
    match config.ocr {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(TesseractCli::new()),
    }
}

/// Resolve the completion client, from most-specific to least-specific:
/// a pre-built client if injected, otherwise an [`OpenAiCompatClient`] for
/// the configured endpoint, model, and key source.
pub(crate) fn resolve_client(config: &ExtractionConfig) -> Arc<dyn ExtractionClient> {
    if let Some(ref client) = config.client {
        return Arc::clone(client);
    }
    let mut client = OpenAiCompatClient::new(
        config.base_url.clone(),
        config.model.clone(),
        config.api_key_env.clone(),
    );
    if let Some(ref key) = config.api_key {
        client = client.with_api_key(key.clone());
    }
    Arc::new(client)
}

/// Run OCR under the configured timeout, returning text and elapsed ms.
pub(crate) async fn run_ocr(
    ocr: &Arc<dyn OcrEngine>,
    document: &SourceDocument,
    config: &ExtractionConfig,
) -> Result<(String, u64), ExtractError> {
    let start = Instant::now();
    let text = timeout(
        Duration::from_secs(config.ocr_timeout_secs),
        ocr.recognize(document, &config.language),
    )
    .await
    .map_err(|_| ExtractError::OcrTimeout {
        secs: config.ocr_timeout_secs,
    })??;
    Ok((text, start.elapsed().as_millis() as u64))
}

/// Run the completion call under the configured timeout.
pub(crate) async fn run_completion(
    client: &Arc<dyn ExtractionClient>,
    prompt: &str,
    config: &ExtractionConfig,
) -> Result<(String, u64), ExtractError> {
    let start = Instant::now();
    let raw = timeout(
        Duration::from_secs(config.api_timeout_secs),
        client.complete(prompt),
    )
    .await
    .map_err(|_| ExtractError::ServiceTimeout {
        secs: config.api_timeout_secs,
    })??;
    Ok((raw, start.elapsed().as_millis() as u64))
}

//! OCR adapter: transcribe a card image via the Tesseract CLI.
//!
//! ## Why a subprocess instead of library bindings?
//!
//! The C-binding crates (leptess, tesseract-rs) drag libleptonica and
//! libtesseract into the build and pin their versions; the `tesseract`
//! binary shipped by every distribution does the same work behind a stable
//! command-line contract. The bytes go to a temp file because Tesseract
//! wants a path, and `stdout` as the output target keeps the transcription
//! off the filesystem.
//!
//! The trait seam exists so the orchestrator never knows which engine runs
//! underneath — tests inject a fake, and an embedding application can wire
//! up a cloud OCR service without touching the pipeline.

use crate::error::ExtractError;
use crate::pipeline::input::SourceDocument;
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

/// A text-recognition engine.
///
/// One suspension point, one observable outcome: the full transcription or
/// a failure. No partial text, no per-word confidence.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine identifier for log lines, e.g. `"tesseract"`.
    fn name(&self) -> &'static str;

    /// Transcribe the document in the given language (`"fra"` for French).
    async fn recognize(
        &self,
        document: &SourceDocument,
        language: &str,
    ) -> Result<String, ExtractError>;
}

/// OCR via the system `tesseract` binary.
pub struct TesseractCli {
    binary: PathBuf,
}

impl TesseractCli {
    /// Use `tesseract` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }

    /// Use an explicit binary path (e.g. a bundled build).
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(
        &self,
        document: &SourceDocument,
        language: &str,
    ) -> Result<String, ExtractError> {
        // Reject corrupt or non-image bytes before spawning anything.
        document.validate()?;

        let mut tmp = tempfile::Builder::new()
            .prefix("carte2json-")
            .suffix(&format!(".{}", document.extension_hint()))
            .tempfile()
            .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(document.bytes())
            .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;

        debug!(
            "Running {} on {} ({} bytes, lang={language})",
            self.binary.display(),
            tmp.path().display(),
            document.bytes().len()
        );

        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractError::Ocr {
                        detail: format!(
                            "'{}' not found — install tesseract-ocr and the '{language}' language data",
                            self.binary.display()
                        ),
                    }
                } else {
                    ExtractError::Ocr {
                        detail: format!("failed to spawn {}: {e}", self.binary.display()),
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract exited with {}: {}", output.status, stderr.trim());
            return Err(ExtractError::Ocr {
                detail: format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR produced {} chars", text.len());
        Ok(text)
    }
}

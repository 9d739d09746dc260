//! Error types for the carte2json library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the run cannot produce a record at all
//!   (no document selected, unreadable image, OCR engine failure, service
//!   unreachable). Returned as `Err(ExtractError)` from the top-level
//!   `extract*` functions and from [`crate::session::ExtractionSession::run`].
//!
//! * [`ParseError`] — **Local**: the LLM answered, but no decodable JSON
//!   object could be located in the response. Caught at the parser boundary
//!   and carried as data inside [`crate::record::ExtractionOutput`] so the
//!   caller still gets the recognized text and timing, rather than losing
//!   the whole run to a malformed completion.
//!
//! Whether a parse failure downgrades the run to `Failed` is a policy
//! decision, not a hard-coded behaviour — see
//! [`crate::config::ParsePolicy`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the carte2json library.
///
/// Parse-level failures use [`ParseError`] and are stored in
/// [`crate::record::ExtractionOutput`] under the default lenient policy.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The run command was issued before any document was selected.
    #[error("No document selected.\nSelect a card image before running the pipeline.")]
    NoFileSelected,

    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The bytes are not a recognisable image format.
    #[error("Unsupported or corrupt image data: {detail}\nSupported inputs: PNG, JPEG, TIFF, BMP, WebP.")]
    UnsupportedMediaType { detail: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR engine could not process the image.
    #[error("OCR failed: {detail}")]
    Ocr { detail: String },

    /// The OCR call exceeded the configured timeout.
    #[error("OCR timed out after {secs}s\nIncrease --ocr-timeout for large scans.")]
    OcrTimeout { secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No API key was available when the completion call was issued.
    ///
    /// A missing key never fails at construction time; the client only
    /// reads the environment when a request is actually sent.
    #[error("API key not found: set the {var} environment variable.")]
    ApiKeyMissing { var: String },

    /// The completion service returned a non-2xx response or the transport failed.
    #[error("LLM service error{}: {detail}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Service { status: Option<u16>, detail: String },

    /// The completion call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s\nIncrease --api-timeout.")]
    ServiceTimeout { secs: u64 },

    /// The service responded, but carried no completion choice or content.
    #[error("LLM returned an empty response (no completion content)")]
    EmptyResponse,

    /// Parsing failed and the strict policy is in force.
    #[error("Field extraction failed: {0}")]
    Parse(#[source] ParseError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recoverable failure to locate or decode the JSON object in a completion.
///
/// Under [`crate::config::ParsePolicy::Lenient`] this never aborts the run;
/// it is stored alongside the recognized text in
/// [`crate::record::ExtractionOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ParseError {
    /// The response contains no `{` … `}` pair to slice.
    #[error("no JSON object found in the model response")]
    NoJsonFound,

    /// A brace-delimited slice was found but is not valid JSON.
    #[error("model response contained malformed JSON: {detail}")]
    MalformedJson { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_file_selected_display() {
        let msg = ExtractError::NoFileSelected.to_string();
        assert!(msg.contains("No document selected"), "got: {msg}");
    }

    #[test]
    fn service_display_with_status() {
        let e = ExtractError::Service {
            status: Some(401),
            detail: "invalid key".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 401"), "got: {msg}");
        assert!(msg.contains("invalid key"));
    }

    #[test]
    fn service_display_without_status() {
        let e = ExtractError::Service {
            status: None,
            detail: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(!msg.contains("HTTP"), "got: {msg}");
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn api_key_missing_names_variable() {
        let e = ExtractError::ApiKeyMissing {
            var: "GROQ_API_KEY".into(),
        };
        assert!(e.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn parse_error_round_trips_through_serde() {
        let e = ParseError::MalformedJson {
            detail: "expected value at line 1".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: ParseError = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn strict_parse_failure_wraps_source() {
        let e = ExtractError::Parse(ParseError::NoJsonFound);
        assert!(e.to_string().contains("no JSON object"));
    }
}

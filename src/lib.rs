//! # carte2json
//!
//! Extract structured fields from French mutuelle-card images using OCR and
//! LLMs.
//!
//! ## Why this crate?
//!
//! A carte mutuelle packs nine pieces of administrative information into a
//! wallet-sized card with no machine-readable zone. Template matching breaks
//! on every insurer's layout; instead this crate transcribes the photo with
//! OCR and lets an LLM map the raw text onto a fixed nine-key JSON schema,
//! returning a typed record or a typed failure.
//!
//! ## Pipeline Overview
//!
//! ```text
//! card image
//!  │
//!  ├─ 1. Input   validate bytes, sniff media type
//!  ├─ 2. OCR     tesseract transcription (lang "fra")
//!  ├─ 3. Prompt  field labels + JSON skeleton + text verbatim
//!  ├─ 4. LLM     one chat completion (Groq / any OpenAI-compatible API)
//!  ├─ 5. Parse   first '{' … last '}', strict JSON decode
//!  └─ 6. Output  CardRecord (9 optional fields) + run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use carte2json::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GROQ_API_KEY at call time
//!     let config = ExtractionConfig::default();
//!     let output = extract("carte.jpg", &config).await?;
//!     match output.record {
//!         Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
//!         None => eprintln!("no fields extracted: {:?}", output.parse_error),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Two APIs
//!
//! * [`extract`] / [`extract_from_bytes`] / [`extract_sync`] — one-shot:
//!   run the pipeline once, get an [`ExtractionOutput`].
//! * [`ExtractionSession`] — stateful: document selection, the
//!   Idle → FileSelected → Recognizing → Extracting → Succeeded/Failed
//!   machine, 0–100 progress, and observer callbacks for UIs.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `carte2json` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! carte2json = { version = "0.2", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ParsePolicy};
pub use error::{ExtractError, ParseError};
pub use extract::{extract, extract_document, extract_from_bytes, extract_sync};
pub use pipeline::input::SourceDocument;
pub use pipeline::llm::{ExtractionClient, OpenAiCompatClient};
pub use pipeline::ocr::{OcrEngine, TesseractCli};
pub use pipeline::parse::parse_record;
pub use progress::{NoopObserver, Observer, PipelineObserver, PipelineState};
pub use record::{CardRecord, ExtractionOutput, ExtractionStats};
pub use session::ExtractionSession;

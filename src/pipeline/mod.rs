//! Pipeline stages for card-field extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different OCR engine) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ prompts ──▶ llm ──▶ parse
//! (image)  (text)   (prompt)   (raw)   (CardRecord)
//! ```
//!
//! 1. [`input`] — wrap the selected image bytes in a validated
//!    `SourceDocument`
//! 2. [`ocr`]   — transcribe the image for the configured language; the
//!    first of the pipeline's two suspension points
//! 3. [`crate::prompts`] — render the transcription into the extraction
//!    prompt (pure, no I/O)
//! 4. [`llm`]   — send the prompt to the completion service; the second
//!    suspension point and the only network I/O
//! 5. [`parse`] — locate and strictly decode the JSON object in the raw
//!    response

pub mod input;
pub mod llm;
pub mod ocr;
pub mod parse;

//! Configuration types for card-field extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share a config between the one-shot API and a
//! session, and to diff two runs to understand why their outputs differ.
//!
//! # Design choice: injectable stages
//! The OCR engine and the completion client are `Arc<dyn …>` slots rather
//! than hard-wired singletons. Production callers leave them empty and get
//! the Tesseract adapter and the Groq-compatible HTTP client; tests inject
//! fakes and exercise the orchestrator without a binary or a network.

use crate::error::ExtractError;
use crate::pipeline::llm::ExtractionClient;
use crate::pipeline::ocr::OcrEngine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default OCR language tag, matching French mutuelle cards.
pub const DEFAULT_LANGUAGE: &str = "fra";

/// Default chat-completion model.
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

/// Default OpenAI-compatible endpoint (Groq).
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Configuration for a card-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use carte2json::{ExtractionConfig, ParsePolicy};
///
/// let config = ExtractionConfig::builder()
///     .model("llama3-8b-8192")
///     .parse_policy(ParsePolicy::Strict)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Tesseract language tag used for recognition. Default: `"fra"`.
    ///
    /// Mutuelle cards are French documents; recognising them with the wrong
    /// language model garbles accented characters and digits alike.
    pub language: String,

    /// Chat-completion model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Base URL of the OpenAI-compatible completion endpoint.
    /// Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Environment variable read for the API key at call time.
    /// Default: [`DEFAULT_API_KEY_ENV`].
    ///
    /// The key is deliberately not read at construction time so that building
    /// a config (or a client) never fails on an unconfigured machine; the
    /// failure surfaces as an authentication error when a request is sent.
    pub api_key_env: String,

    /// Explicit API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,

    /// Pre-constructed completion client. Takes precedence over
    /// `base_url`/`model`/`api_key*`.
    pub client: Option<Arc<dyn ExtractionClient>>,

    /// Pre-constructed OCR engine. Defaults to the Tesseract CLI adapter.
    pub ocr: Option<Arc<dyn OcrEngine>>,

    /// What to do when the completion cannot be parsed into a record.
    /// Default: [`ParsePolicy::Lenient`].
    pub parse_policy: ParsePolicy,

    /// OCR call timeout in seconds. Default: 120.
    ///
    /// Tesseract on a large phone photo can take tens of seconds; two
    /// minutes is generous without letting a hung engine stall forever.
    pub ocr_timeout_secs: u64,

    /// Completion call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Delay before progress resets from 100 to 0 after a run, in
    /// milliseconds. Default: 1000.
    ///
    /// Purely presentational: the bar lingers at 100 long enough for the
    /// user to register completion, then clears for the next run.
    pub progress_reset_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            client: None,
            ocr: None,
            parse_policy: ParsePolicy::default(),
            ocr_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_reset_ms: 1000,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("language", &self.language)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key_env", &self.api_key_env)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("client", &self.client.as_ref().map(|_| "<dyn ExtractionClient>"))
            .field("ocr", &self.ocr.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("parse_policy", &self.parse_policy)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("progress_reset_ms", &self.progress_reset_ms)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ExtractionClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr = Some(engine);
        self
    }

    pub fn parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.config.parse_policy = policy;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_reset_ms(mut self, ms: u64) -> Self {
        self.config.progress_reset_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.language.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "language must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("model must not be empty".into()));
        }
        if c.base_url.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "base_url must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the orchestrator treats a completion that yields no decodable record.
///
/// LLM responses are not guaranteed well-formed JSON; whether that should
/// fail the run depends on the caller. An interactive UI may prefer showing
/// the OCR text it did get, a batch importer wants the run flagged as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParsePolicy {
    /// The run reports success on OCR alone; the typed parse error is
    /// carried in the output and logged, but no record is published. (default)
    #[default]
    Lenient,
    /// A parse failure fails the run with
    /// [`crate::error::ExtractError::Parse`].
    Strict,
}

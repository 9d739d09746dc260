//! Completion client: send the extraction prompt to an OpenAI-compatible
//! chat endpoint and return the raw response text.
//!
//! This module is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] and all response interpretation in
//! [`crate::pipeline::parse`], so the wire concerns here (request shape,
//! auth, status handling) can change without touching either.
//!
//! ## No retries
//!
//! A card scan is an interactive, single-shot operation; the user re-invokes
//! on failure. Retry loops would only delay the failure notification, so
//! every transport or service error is terminal for the run.

use crate::error::ExtractError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// A chat-completion service that turns a prompt into raw response text.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Send the prompt as a single user message; return the first choice's
    /// trimmed content.
    async fn complete(&self, prompt: &str) -> Result<String, ExtractError>;
}

/// HTTP client for any OpenAI-compatible `/chat/completions` endpoint
/// (Groq by default).
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
}

impl fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key_env", &self.api_key_env)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OpenAiCompatClient {
    /// Create a client for `base_url` and `model`, reading the API key from
    /// `api_key_env` when a request is sent.
    ///
    /// Never fails: a missing key surfaces as
    /// [`ExtractError::ApiKeyMissing`] at call time, not here.
    pub fn new(
        mut base_url: String,
        model: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            model: model.into(),
            api_key_env: api_key_env.into(),
            api_key: None,
        }
    }

    /// Use an explicit API key instead of the environment variable.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Use a pre-configured `reqwest::Client` (custom timeout, proxy, …).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Resolve the key: explicit override first, then the environment.
    fn resolve_api_key(&self) -> Result<String, ExtractError> {
        if let Some(ref key) = self.api_key {
            return Ok(key.clone());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(ExtractError::ApiKeyMissing {
                var: self.api_key_env.clone(),
            }),
        }
    }
}

#[async_trait]
impl ExtractionClient for OpenAiCompatClient {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractError> {
        let api_key = self.resolve_api_key()?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(
            "POST {}/chat/completions (model={}, prompt={} chars)",
            self.base_url,
            self.model,
            prompt.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::Service {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ExtractError::Service {
            status: Some(status.as_u16()),
            detail: e.to_string(),
        })?;

        if !status.is_success() {
            tracing::error!("Completion API error {status}: {text}");
            let detail = if status.as_u16() == 401 || status.as_u16() == 403 {
                format!("authentication rejected — check {}", self.api_key_env)
            } else {
                text
            };
            return Err(ExtractError::Service {
                status: Some(status.as_u16()),
                detail,
            });
        }

        let resp: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ExtractError::Service {
                status: Some(status.as_u16()),
                detail: format!("unparseable completion payload: {e}"),
            })?;

        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ExtractError::EmptyResponse);
        }

        debug!("Completion returned {} chars", content.len());
        Ok(content)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

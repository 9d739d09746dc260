//! The pipeline orchestrator: document selection, the run state machine,
//! and progress publication.
//!
//! [`ExtractionSession`] is the stateful counterpart of the one-shot
//! [`crate::extract`] API, built for Presentation Layers that render
//! intermediate states. It owns the
//! Idle → FileSelected → Recognizing → Extracting → Succeeded/Failed
//! machine together with the 0–100 progress value, and publishes every
//! transition to an injected [`PipelineObserver`].
//!
//! ## One run wins
//!
//! At most one run's state is ever visible. Each call to [`run`] takes a
//! fresh token from an atomic counter, and every state publication compares
//! its token against the counter: a publication from a superseded run is
//! silently dropped. Starting a new run (or selecting a new document) while
//! an earlier run is still in flight therefore never produces interleaved
//! state — the in-flight OCR or HTTP call runs to completion, but its
//! outcome is only returned to its own caller, never published.
//!
//! [`run`]: ExtractionSession::run

use crate::config::{ExtractionConfig, ParsePolicy};
use crate::error::ExtractError;
use crate::extract::{resolve_client, resolve_ocr, run_completion, run_ocr};
use crate::pipeline::{input::SourceDocument, parse};
use crate::progress::{Observer, PipelineObserver, PipelineState};
use crate::prompts;
use crate::record::{CardRecord, ExtractionOutput, ExtractionStats};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

// Progress milestones, fixed by the state machine.
const PROGRESS_FILE_SELECTED: u8 = 25;
const PROGRESS_RECOGNIZING: u8 = 50;
const PROGRESS_EXTRACTING: u8 = 75;
const PROGRESS_DONE: u8 = 100;

/// Stateful extraction pipeline with observable progress.
///
/// # Example
/// ```rust,no_run
/// use carte2json::{ExtractionConfig, ExtractionSession};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = ExtractionSession::new(ExtractionConfig::default());
/// session.select_file("carte.jpg").await?;
/// let output = session.run().await?;
/// if let Some(record) = output.record {
///     println!("{}", serde_json::to_string_pretty(&record)?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ExtractionSession {
    config: ExtractionConfig,
    observer: Option<Observer>,
    inner: Arc<Mutex<Inner>>,
    run_seq: Arc<AtomicU64>,
}

#[derive(Default)]
struct Inner {
    state: PipelineState,
    progress: u8,
    document: Option<SourceDocument>,
    record: Option<CardRecord>,
}

impl ExtractionSession {
    /// Create a session with the given configuration, starting Idle.
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            observer: None,
            inner: Arc::new(Mutex::new(Inner::default())),
            run_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attach an observer receiving state transitions and results.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    // ── Presentation-boundary commands ───────────────────────────────────

    /// Select a document from raw bytes and a declared media type.
    ///
    /// Clears any previously published record and supersedes an in-flight
    /// run. State becomes FileSelected with progress 25.
    pub fn select_document(&self, bytes: Vec<u8>, media_type: impl Into<String>) {
        self.select_source(SourceDocument::new(bytes, media_type));
    }

    /// Select a document from a file on disk (media type sniffed).
    pub async fn select_file(&self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        let document = SourceDocument::from_path(path).await?;
        self.select_source(document);
        Ok(())
    }

    /// Select an already-constructed document.
    pub fn select_source(&self, document: SourceDocument) {
        // Selecting takes a fresh token so a pending progress reset (or any
        // publication) from an earlier run cannot stomp the new selection.
        let token = self.run_seq.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut inner = self.inner.lock().expect("session state poisoned");
            inner.document = Some(document);
            inner.record = None;
            inner.state = PipelineState::FileSelected;
            inner.progress = PROGRESS_FILE_SELECTED;
        }
        debug!(token, "Document selected");
        self.notify_state(PipelineState::FileSelected, PROGRESS_FILE_SELECTED);
    }

    /// Run the pipeline on the selected document.
    ///
    /// Consumes the selection: a subsequent `run` without re-selecting
    /// fails with [`ExtractError::NoFileSelected`], and does so without
    /// touching the OCR engine or the completion service.
    pub async fn run(&self) -> Result<ExtractionOutput, ExtractError> {
        let token = self.run_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let total_start = Instant::now();

        let document = {
            let mut inner = self.inner.lock().expect("session state poisoned");
            inner.document.take()
        };
        let Some(document) = document else {
            return Err(self.fail(token, ExtractError::NoFileSelected));
        };

        let ocr = resolve_ocr(&self.config);
        let client = resolve_client(&self.config);

        // ── Recognizing ──────────────────────────────────────────────────
        self.publish(token, PipelineState::Recognizing, PROGRESS_RECOGNIZING);
        let (recognized_text, ocr_duration_ms) =
            match run_ocr(&ocr, &document, &self.config).await {
                Ok(v) => v,
                Err(e) => return Err(self.fail(token, e)),
            };
        info!(
            "OCR complete: {} chars in {}ms",
            recognized_text.len(),
            ocr_duration_ms
        );

        // ── Extracting ───────────────────────────────────────────────────
        self.publish(token, PipelineState::Extracting, PROGRESS_EXTRACTING);
        let prompt = prompts::build_prompt(&recognized_text);
        let (raw_response, llm_duration_ms) =
            match run_completion(&client, &prompt, &self.config).await {
                Ok(v) => v,
                Err(e) => return Err(self.fail(token, e)),
            };

        let (record, parse_error) = match parse::parse_record(&raw_response) {
            Ok(record) => {
                info!("Parsed record with {}/9 fields", record.filled_count());
                (Some(record), None)
            }
            Err(e) => match self.config.parse_policy {
                ParsePolicy::Lenient => {
                    warn!("Field extraction failed, reporting OCR-only success: {e}");
                    (None, Some(e))
                }
                ParsePolicy::Strict => {
                    return Err(self.fail(token, ExtractError::Parse(e)));
                }
            },
        };

        // ── Succeeded ────────────────────────────────────────────────────
        if let Some(ref record) = record {
            let mut inner = self.inner.lock().expect("session state poisoned");
            if self.run_seq.load(Ordering::SeqCst) == token {
                inner.record = Some(record.clone());
            }
        }
        if self.publish(token, PipelineState::Succeeded, PROGRESS_DONE) {
            if let (Some(ref observer), Some(ref record)) = (&self.observer, &record) {
                observer.on_record(record);
            }
        }
        self.schedule_progress_reset(token, PipelineState::Succeeded);

        Ok(ExtractionOutput {
            record,
            recognized_text: recognized_text.clone(),
            parse_error,
            stats: ExtractionStats {
                ocr_duration_ms,
                llm_duration_ms,
                total_duration_ms: total_start.elapsed().as_millis() as u64,
                recognized_chars: recognized_text.len(),
                response_chars: raw_response.len(),
            },
        })
    }

    // ── Observable state ─────────────────────────────────────────────────

    /// The current pipeline state.
    pub fn state(&self) -> PipelineState {
        self.inner.lock().expect("session state poisoned").state
    }

    /// The current progress value, 0–100.
    pub fn progress(&self) -> u8 {
        self.inner.lock().expect("session state poisoned").progress
    }

    /// The last published record, if the previous run produced one.
    pub fn record(&self) -> Option<CardRecord> {
        self.inner
            .lock()
            .expect("session state poisoned")
            .record
            .clone()
    }

    /// True when a document is selected and waiting to run.
    pub fn has_document(&self) -> bool {
        self.inner
            .lock()
            .expect("session state poisoned")
            .document
            .is_some()
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Publish a state transition unless this run has been superseded.
    /// Returns whether the publication went through.
    fn publish(&self, token: u64, state: PipelineState, progress: u8) -> bool {
        {
            let mut inner = self.inner.lock().expect("session state poisoned");
            if self.run_seq.load(Ordering::SeqCst) != token {
                debug!(token, ?state, "Dropping publication from superseded run");
                return false;
            }
            inner.state = state;
            inner.progress = progress;
        }
        self.notify_state(state, progress);
        true
    }

    /// Mark the run failed, publish, and hand the error back for `?`-style
    /// returns. Progress is forced to 100 and reset after the delay.
    fn fail(&self, token: u64, error: ExtractError) -> ExtractError {
        if self.publish(token, PipelineState::Failed, PROGRESS_DONE) {
            if let Some(ref observer) = self.observer {
                observer.on_failure(&error);
            }
        }
        self.schedule_progress_reset(token, PipelineState::Failed);
        error
    }

    /// After the configured delay, return progress to 0 — purely
    /// presentational; the terminal state is untouched. Skipped if another
    /// run (or selection) has taken over in the meantime.
    fn schedule_progress_reset(&self, token: u64, state: PipelineState) {
        let inner = Arc::clone(&self.inner);
        let run_seq = Arc::clone(&self.run_seq);
        let observer = self.observer.clone();
        let delay = self.config.progress_reset_ms;

        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            {
                let mut guard = inner.lock().expect("session state poisoned");
                if run_seq.load(Ordering::SeqCst) != token {
                    return;
                }
                guard.progress = 0;
            }
            if let Some(observer) = observer {
                observer.on_state(state, 0);
            }
        });
    }

    fn notify_state(&self, state: PipelineState, progress: u8) {
        if let Some(ref observer) = self.observer {
            observer.on_state(state, progress);
        }
    }
}

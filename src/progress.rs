//! Pipeline state and the observer trait the Presentation Layer implements.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::session::ExtractionSession::with_observer`] to receive state
//! transitions and the 0–100 progress value as the pipeline advances.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a GUI event loop, or a terminal progress
//! bar without the library knowing how the host application communicates.
//! The trait is `Send + Sync` because the deferred progress reset fires from
//! a spawned task.

use crate::error::ExtractError;
use crate::record::CardRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a pipeline run currently stands.
///
/// Transitions within a run are strictly forward; the associated progress
/// value is monotonic until the terminal 100, then resets to 0 after the
/// configured delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PipelineState {
    /// No document selected, nothing running.
    #[default]
    Idle,
    /// A document is selected and waiting for the run command. Progress 25.
    FileSelected,
    /// The OCR engine is transcribing the image. Progress 50.
    Recognizing,
    /// The completion service and parser are producing the record. Progress 75.
    Extracting,
    /// The run finished; under the lenient policy this includes runs whose
    /// response failed to parse. Progress 100, then 0.
    Succeeded,
    /// The run failed; no record was published. Progress 100, then 0.
    Failed,
}

impl PipelineState {
    /// True for the two terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }
}

/// Called by the session as a run advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. State publications for a superseded run are dropped
/// before reaching the observer, so implementations never see two
/// interleaved runs.
pub trait PipelineObserver: Send + Sync {
    /// Called on every state transition, including the deferred progress
    /// reset (which re-reports the terminal state with progress 0).
    fn on_state(&self, state: PipelineState, progress: u8) {
        let _ = (state, progress);
    }

    /// Called once when a run publishes a structured record.
    fn on_record(&self, record: &CardRecord) {
        let _ = record;
    }

    /// Called once when a run fails, with the terminal error.
    fn on_failure(&self, error: &ExtractError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in
/// [`crate::session::ExtractionSession`].
pub type Observer = Arc<dyn PipelineObserver>;

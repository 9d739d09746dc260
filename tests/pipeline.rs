//! Integration tests for the extraction pipeline.
//!
//! The deterministic tests drive a full [`ExtractionSession`] with scripted
//! OCR and completion backends, asserting on the observable contract: state
//! transitions, progress milestones, published records, and the failure
//! taxonomy. No network or Tesseract install is needed.
//!
//! One live test at the bottom runs the real stack. It is gated behind the
//! `E2E_ENABLED` environment variable plus a card image path and an API key:
//!
//!   E2E_ENABLED=1 CARTE2JSON_E2E_IMAGE=carte.jpg cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use carte2json::{
    CardRecord, ExtractError, ExtractionClient, ExtractionConfig, ExtractionSession, OcrEngine,
    ParseError, ParsePolicy, PipelineObserver, PipelineState, SourceDocument,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// OCR backend that returns a fixed transcription and counts invocations.
struct FakeOcr {
    text: String,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeOcr {
    fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: String::new(),
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn recognize(
        &self,
        _document: &SourceDocument,
        _language: &str,
    ) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ExtractError::Ocr {
                detail: "scripted failure".into(),
            })
        } else {
            Ok(self.text.clone())
        }
    }
}

/// Completion backend that returns a fixed response and counts invocations.
struct FakeClient {
    response: String,
    calls: AtomicUsize,
}

impl FakeClient {
    fn ok(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionClient for FakeClient {
    async fn complete(&self, _prompt: &str) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// OCR backend that never answers within any realistic deadline.
struct StalledOcr;

#[async_trait]
impl OcrEngine for StalledOcr {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn recognize(
        &self,
        _document: &SourceDocument,
        _language: &str,
    ) -> Result<String, ExtractError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

/// Completion backend that never answers within any realistic deadline.
struct StalledClient;

#[async_trait]
impl ExtractionClient for StalledClient {
    async fn complete(&self, _prompt: &str) -> Result<String, ExtractError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

/// Observer recording every (state, progress) publication.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<(PipelineState, u8)>>,
    records: Mutex<Vec<CardRecord>>,
    failures: AtomicUsize,
}

impl RecordingObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn events(&self) -> Vec<(PipelineState, u8)> {
        self.events.lock().unwrap().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_state(&self, state: PipelineState, progress: u8) {
        self.events.lock().unwrap().push((state, progress));
    }

    fn on_record(&self, record: &CardRecord) {
        self.records.lock().unwrap().push(record.clone());
    }

    fn on_failure(&self, _error: &ExtractError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

fn config_with(
    ocr: Arc<FakeOcr>,
    client: Arc<FakeClient>,
    policy: ParsePolicy,
) -> ExtractionConfig {
    ExtractionConfig::builder()
        .ocr(ocr)
        .client(client)
        .parse_policy(policy)
        .progress_reset_ms(20)
        .build()
        .unwrap()
}

const FULL_RESPONSE: &str = r#"{
  "nomMutuelle": "Harmonie Mutuelle",
  "reseauSoin": "Kalivia",
  "categorieMutuelle": "Santé",
  "numeroTeletransmission": "75500017",
  "numeroAMC": "0075500017",
  "infoAdherents": "DUPONT Marie, née 1985",
  "periodeValidite": "01/01/2026 - 31/12/2026",
  "actesTiersPayant": "PHAR, OPTI, DENT",
  "coordonneesMutuelle": "www.harmonie-mutuelle.fr"
}"#;

// ── Deterministic end-to-end runs ────────────────────────────────────────────

#[tokio::test]
async fn successful_run_publishes_every_milestone_in_order() {
    let ocr = FakeOcr::ok("HARMONIE MUTUELLE\nAMC 0075500017");
    let client = FakeClient::ok(FULL_RESPONSE);
    let observer = RecordingObserver::new();

    let session = ExtractionSession::new(config_with(
        Arc::clone(&ocr),
        Arc::clone(&client),
        ParsePolicy::Lenient,
    ))
    .with_observer(Arc::clone(&observer) as Arc<dyn PipelineObserver>);

    session.select_document(vec![0u8; 16], "image/png");
    let output = session.run().await.unwrap();

    assert_eq!(
        observer.events(),
        vec![
            (PipelineState::FileSelected, 25),
            (PipelineState::Recognizing, 50),
            (PipelineState::Extracting, 75),
            (PipelineState::Succeeded, 100),
        ]
    );
    assert_eq!(ocr.calls(), 1);
    assert_eq!(client.calls(), 1);
    assert_eq!(observer.records.lock().unwrap().len(), 1);

    let record = output.record.expect("record published");
    assert_eq!(record.nom_mutuelle.as_deref(), Some("Harmonie Mutuelle"));
    assert_eq!(record.numero_amc.as_deref(), Some("0075500017"));
    assert_eq!(record.filled_count(), 9);
    assert_eq!(session.record(), Some(record));
    assert_eq!(session.state(), PipelineState::Succeeded);
    assert!(output.parse_error.is_none());
    assert_eq!(
        output.recognized_text,
        "HARMONIE MUTUELLE\nAMC 0075500017"
    );
}

#[tokio::test]
async fn run_without_selection_touches_no_backend() {
    let ocr = FakeOcr::ok("unused");
    let client = FakeClient::ok(FULL_RESPONSE);
    let session = ExtractionSession::new(config_with(
        Arc::clone(&ocr),
        Arc::clone(&client),
        ParsePolicy::Lenient,
    ));

    let err = session.run().await.unwrap_err();
    assert!(matches!(err, ExtractError::NoFileSelected));
    assert_eq!(ocr.calls(), 0);
    assert_eq!(client.calls(), 0);
    assert_eq!(session.state(), PipelineState::Failed);
}

#[tokio::test]
async fn ocr_failure_fails_the_run_and_resets_progress() {
    let ocr = FakeOcr::failing();
    let client = FakeClient::ok(FULL_RESPONSE);
    let observer = RecordingObserver::new();

    let session = ExtractionSession::new(config_with(
        Arc::clone(&ocr),
        Arc::clone(&client),
        ParsePolicy::Lenient,
    ))
    .with_observer(Arc::clone(&observer) as Arc<dyn PipelineObserver>);

    session.select_document(vec![0u8; 16], "image/jpeg");
    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ExtractError::Ocr { .. }));
    assert_eq!(client.calls(), 0, "completion must not run after OCR failure");
    assert_eq!(session.state(), PipelineState::Failed);
    assert_eq!(session.progress(), 100);
    assert!(session.record().is_none());
    assert_eq!(observer.failures.load(Ordering::SeqCst), 1);

    // After the configured delay the progress value returns to 0 while the
    // terminal state stays put.
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    assert_eq!(session.progress(), 0);
    assert_eq!(session.state(), PipelineState::Failed);
}

#[tokio::test]
async fn prose_wrapped_response_still_yields_a_record() {
    let ocr = FakeOcr::ok("texte de la carte");
    let client = FakeClient::ok(
        "Voici les informations extraites :\n```json\n{\"nomMutuelle\": \"MGEN\", \"numeroAMC\": \"430000000\"}\n```\nBonne journée !",
    );

    let session = ExtractionSession::new(config_with(ocr, client, ParsePolicy::Lenient));
    session.select_document(vec![0u8; 16], "image/png");
    let output = session.run().await.unwrap();

    let record = output.record.expect("record parsed from wrapped response");
    assert_eq!(record.nom_mutuelle.as_deref(), Some("MGEN"));
    assert_eq!(record.numero_amc.as_deref(), Some("430000000"));
    assert_eq!(record.filled_count(), 2);
}

// ── Parse-policy behaviour ───────────────────────────────────────────────────

#[tokio::test]
async fn lenient_policy_reports_ocr_only_success_on_garbage() {
    let ocr = FakeOcr::ok("MUTUELLE VERTE 123456");
    let client = FakeClient::ok("Je ne peux pas traiter cette demande.");

    let session = ExtractionSession::new(config_with(ocr, client, ParsePolicy::Lenient));
    session.select_document(vec![0u8; 16], "image/png");
    let output = session.run().await.unwrap();

    assert!(output.record.is_none());
    assert_eq!(output.parse_error, Some(ParseError::NoJsonFound));
    assert_eq!(output.recognized_text, "MUTUELLE VERTE 123456");
    assert_eq!(session.state(), PipelineState::Succeeded);
    assert!(session.record().is_none(), "no record is ever published");
}

#[tokio::test]
async fn strict_policy_fails_the_run_on_garbage() {
    let ocr = FakeOcr::ok("MUTUELLE VERTE 123456");
    let client = FakeClient::ok("Je ne peux pas traiter cette demande.");
    let observer = RecordingObserver::new();

    let session = ExtractionSession::new(config_with(ocr, client, ParsePolicy::Strict))
        .with_observer(Arc::clone(&observer) as Arc<dyn PipelineObserver>);
    session.select_document(vec![0u8; 16], "image/png");
    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ExtractError::Parse(ParseError::NoJsonFound)));
    assert_eq!(session.state(), PipelineState::Failed);
    assert_eq!(observer.failures.load(Ordering::SeqCst), 1);
    assert!(observer.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn strict_policy_surfaces_malformed_json() {
    let ocr = FakeOcr::ok("texte");
    let client = FakeClient::ok("{\"nomMutuelle\": \"MGEN\""); // truncated

    let session = ExtractionSession::new(config_with(ocr, client, ParsePolicy::Strict));
    session.select_document(vec![0u8; 16], "image/png");
    let err = session.run().await.unwrap_err();

    assert!(matches!(
        err,
        ExtractError::Parse(ParseError::NoJsonFound | ParseError::MalformedJson { .. })
    ));
}

// ── Timeouts ─────────────────────────────────────────────────────────────────
//
// Paused-clock tests: tokio advances time automatically once every task is
// idle, so a 3600-second stall trips a 1-second deadline instantly.

#[tokio::test(start_paused = true)]
async fn stalled_ocr_trips_the_ocr_timeout() {
    let client = FakeClient::ok(FULL_RESPONSE);
    let config = ExtractionConfig::builder()
        .ocr(Arc::new(StalledOcr))
        .client(client.clone())
        .ocr_timeout_secs(1)
        .progress_reset_ms(20)
        .build()
        .unwrap();

    let session = ExtractionSession::new(config);
    session.select_document(vec![0u8; 16], "image/png");
    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ExtractError::OcrTimeout { secs: 1 }), "{err:?}");
    assert_eq!(session.state(), PipelineState::Failed);
    assert_eq!(client.calls(), 0, "completion must not run after an OCR timeout");
    assert!(session.record().is_none());
}

#[tokio::test(start_paused = true)]
async fn stalled_completion_trips_the_service_timeout() {
    let ocr = FakeOcr::ok("MUTUELLE ABC");
    let config = ExtractionConfig::builder()
        .ocr(ocr.clone())
        .client(Arc::new(StalledClient))
        .api_timeout_secs(1)
        .progress_reset_ms(20)
        .build()
        .unwrap();

    let session = ExtractionSession::new(config);
    session.select_document(vec![0u8; 16], "image/png");
    let err = session.run().await.unwrap_err();

    assert!(
        matches!(err, ExtractError::ServiceTimeout { secs: 1 }),
        "{err:?}"
    );
    assert_eq!(ocr.calls(), 1, "OCR ran before the completion stalled");
    assert_eq!(session.state(), PipelineState::Failed);
    assert!(session.record().is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_but_in_deadline_backends_still_succeed() {
    // An engine that answers late is not a timeout as long as it beats the
    // deadline; the double-`?` in the stage helpers must propagate the inner
    // Ok, not the elapsed branch.
    struct SlowOcr;

    #[async_trait]
    impl OcrEngine for SlowOcr {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn recognize(
            &self,
            _document: &SourceDocument,
            _language: &str,
        ) -> Result<String, ExtractError> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok("MUTUELLE ABC".into())
        }
    }

    let config = ExtractionConfig::builder()
        .ocr(Arc::new(SlowOcr))
        .client(FakeClient::ok(FULL_RESPONSE))
        .ocr_timeout_secs(120)
        .progress_reset_ms(20)
        .build()
        .unwrap();

    let session = ExtractionSession::new(config);
    session.select_document(vec![0u8; 16], "image/png");
    let output = session.run().await.unwrap();

    assert_eq!(session.state(), PipelineState::Succeeded);
    assert_eq!(output.recognized_text, "MUTUELLE ABC");
    assert!(output.record.is_some());
}

// ── Output statistics ────────────────────────────────────────────────────────

#[tokio::test]
async fn output_carries_timing_and_size_statistics() {
    let ocr = FakeOcr::ok("abcdef");
    let client = FakeClient::ok(FULL_RESPONSE);

    let session = ExtractionSession::new(config_with(ocr, client, ParsePolicy::Lenient));
    session.select_document(vec![0u8; 16], "image/png");
    let output = session.run().await.unwrap();

    assert_eq!(output.stats.recognized_chars, 6);
    assert_eq!(output.stats.response_chars, FULL_RESPONSE.len());
    assert!(output.stats.total_duration_ms >= output.stats.ocr_duration_ms);
}

// ── Live end-to-end (opt in) ─────────────────────────────────────────────────

/// Runs the real Tesseract + Groq stack against a user-supplied card image.
#[tokio::test]
async fn live_extraction() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run live tests");
        return;
    }
    let Ok(image) = std::env::var("CARTE2JSON_E2E_IMAGE") else {
        println!("SKIP — set CARTE2JSON_E2E_IMAGE to a card image path");
        return;
    };

    let config = ExtractionConfig::builder().build().unwrap();
    let output = carte2json::extract(&image, &config).await.expect("live run");

    println!("recognized {} chars", output.stats.recognized_chars);
    if let Some(record) = output.record {
        println!("{}", serde_json::to_string_pretty(&record).unwrap());
        assert!(record.filled_count() > 0);
    } else {
        println!("parse failed: {:?}", output.parse_error);
    }
}

//! Integration tests for the voice evidence analysis pipeline.
//!
//! These run entirely offline: fixed analysis backends, inline blob storage,
//! and a throwaway SQLite file per test.

use std::sync::{Arc, Mutex};
use voxcase_analysis::{
    AnalysisError, AnalysisOptions, AnalysisResult, AudioAnalyzer, CombinedAnalysis,
    ComposedAnalyzer, EmotionClass, EmotionResult, FixedEmotion, FixedTranscription,
    TranscriptionBackend, TranscriptionResult,
};
use voxcase_evidence::{
    AnalysisPipeline, AnalysisState, EvidenceConfig, EvidenceError, FailureKind, IngestRequest,
    Ingestor, InlineBlobStore, NewRecording, RecordingFilter, RecordingStore,
};

fn temp_store() -> Arc<RecordingStore> {
    let path = std::env::temp_dir()
        .join("voxcase-tests")
        .join(format!("{}.sqlite", uuid::Uuid::new_v4()));
    Arc::new(RecordingStore::new(path).unwrap())
}

struct Fixture {
    store: Arc<RecordingStore>,
    transcription: Arc<FixedTranscription>,
    emotion: Arc<FixedEmotion>,
    pipeline: AnalysisPipeline,
}

/// Pipeline wired with fixed backends returning the given transcript/emotion.
fn fixture(transcript: &str, emotion_class: EmotionClass) -> Fixture {
    let store = temp_store();
    let transcription = Arc::new(FixedTranscription::with_text(transcript, "es"));
    let emotion = Arc::new(FixedEmotion::with_class(emotion_class, 0.9));
    let analyzer = Arc::new(ComposedAnalyzer::new(transcription.clone(), emotion.clone()));
    let pipeline = AnalysisPipeline::new(
        store.clone(),
        Arc::new(InlineBlobStore::new()),
        transcription.clone(),
        analyzer,
        EvidenceConfig::default(),
    );
    Fixture {
        store,
        transcription,
        emotion,
        pipeline,
    }
}

fn ingest_sample(store: &Arc<RecordingStore>, owner: &str) -> String {
    let ingestor = Ingestor::new(
        store.clone(),
        Arc::new(InlineBlobStore::new()),
        EvidenceConfig::default(),
    );
    ingestor
        .ingest(IngestRequest {
            bytes: vec![7u8; 500_000],
            mime_type: "audio/webm".to_string(),
            filename: "capture.webm".to_string(),
            owner_id: owner.to_string(),
            issue_id: None,
            duration_secs: None,
            captured_at_ms: None,
            location: None,
            notes: None,
            tags: vec![],
        })
        .unwrap()
        .id
}

/// Analyzer that always fails, counting invocations.
struct FailingAnalyzer {
    calls: std::sync::atomic::AtomicUsize,
}

impl FailingAnalyzer {
    fn new() -> Self {
        Self {
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl AudioAnalyzer for FailingAnalyzer {
    async fn analyze_audio(
        &self,
        _audio: &[u8],
        _opts: &AnalysisOptions,
    ) -> AnalysisResult<CombinedAnalysis> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Err(AnalysisError::Emotion("provider unavailable".to_string()))
    }
}

fn sample_combined(transcript: &str, class: EmotionClass) -> CombinedAnalysis {
    CombinedAnalysis {
        transcription: TranscriptionResult {
            text: transcript.to_string(),
            language: "es".to_string(),
            segments: vec![],
        },
        emotion: EmotionResult {
            classification: class,
            confidence: 0.9,
            signals: vec![],
        },
    }
}

/// Analyzer that succeeds but takes an exclusive lock on the evidence DB
/// before returning, so every write after the collaborator call hits a dead
/// database until the lock is released.
struct LockingAnalyzer {
    db_path: std::path::PathBuf,
    held: Mutex<Option<rusqlite::Connection>>,
}

impl LockingAnalyzer {
    fn new(db_path: std::path::PathBuf) -> Self {
        Self {
            db_path,
            held: Mutex::new(None),
        }
    }

    fn release(&self) {
        self.held.lock().unwrap().take();
    }
}

#[async_trait::async_trait]
impl AudioAnalyzer for LockingAnalyzer {
    async fn analyze_audio(
        &self,
        _audio: &[u8],
        _opts: &AnalysisOptions,
    ) -> AnalysisResult<CombinedAnalysis> {
        let conn = rusqlite::Connection::open(&self.db_path)
            .map_err(|e| AnalysisError::Emotion(e.to_string()))?;
        conn.execute_batch("BEGIN EXCLUSIVE")
            .map_err(|e| AnalysisError::Emotion(e.to_string()))?;
        *self.held.lock().unwrap() = Some(conn);
        Ok(sample_combined("ayuda", EmotionClass::Fear))
    }
}

/// Analyzer that succeeds but soft-deletes the recording mid-call, as a
/// concurrent delete request would.
struct DeletingAnalyzer {
    store: Arc<RecordingStore>,
    id: String,
}

#[async_trait::async_trait]
impl AudioAnalyzer for DeletingAnalyzer {
    async fn analyze_audio(
        &self,
        _audio: &[u8],
        _opts: &AnalysisOptions,
    ) -> AnalysisResult<CombinedAnalysis> {
        self.store
            .soft_delete(&self.id)
            .map_err(|e| AnalysisError::Emotion(e.to_string()))?;
        Ok(sample_combined("todo tranquilo", EmotionClass::Calm))
    }
}

/// Transcription backend that always fails.
struct FailingTranscription;

#[async_trait::async_trait]
impl TranscriptionBackend for FailingTranscription {
    async fn transcribe(
        &self,
        _audio: &[u8],
        _opts: &voxcase_analysis::TranscriptionOptions,
    ) -> AnalysisResult<voxcase_analysis::TranscriptionResult> {
        Err(AnalysisError::Transcription("upstream 503".to_string()))
    }
}

#[tokio::test]
async fn full_analysis_flags_emergency_and_completes() {
    let fx = fixture("ayuda me están deteniendo", EmotionClass::Fear);
    let id = ingest_sample(&fx.store, "U1");

    let before = fx.pipeline.get(&id).unwrap();
    assert_eq!(before.state, AnalysisState::Pending);
    assert_eq!(before.duration_secs, 31.0);

    let summary = fx.pipeline.analyze(&id).await.unwrap();
    assert_eq!(summary.state, AnalysisState::Completed);
    assert_eq!(
        summary.transcription.as_ref().unwrap().text,
        "ayuda me están deteniendo"
    );
    assert_eq!(
        summary.emotion.as_ref().unwrap().classification,
        EmotionClass::Fear
    );
    assert!(summary.is_emergency);
    assert!(summary.emergency_keywords.contains(&"ayuda".to_string()));
    assert_eq!(fx.transcription.call_count(), 1);
    assert_eq!(fx.emotion.call_count(), 1);
}

#[tokio::test]
async fn repeated_analysis_is_a_no_op_read() {
    let fx = fixture("todo tranquilo", EmotionClass::Calm);
    let id = ingest_sample(&fx.store, "U1");

    let first = fx.pipeline.analyze(&id).await.unwrap();
    let second = fx.pipeline.analyze(&id).await.unwrap();

    assert_eq!(second.state, AnalysisState::Completed);
    assert_eq!(
        first.transcription.as_ref().unwrap().text,
        second.transcription.as_ref().unwrap().text
    );
    // no new collaborator calls on the second request
    assert_eq!(fx.transcription.call_count(), 1);
    assert_eq!(fx.emotion.call_count(), 1);
    assert!(!second.is_emergency);
}

#[tokio::test]
async fn combined_failure_persists_failed_state() {
    let store = temp_store();
    let analyzer = Arc::new(FailingAnalyzer::new());
    let pipeline = AnalysisPipeline::new(
        store.clone(),
        Arc::new(InlineBlobStore::new()),
        Arc::new(FixedTranscription::new()),
        analyzer,
        EvidenceConfig::default(),
    );
    let id = ingest_sample(&store, "U1");

    let err = pipeline.analyze(&id).await.unwrap_err();
    assert!(matches!(err, EvidenceError::Analysis(_)));
    assert!(err.is_retryable());

    let failed = pipeline.get(&id).unwrap();
    assert_eq!(failed.state, AnalysisState::Failed);
    let failure = failed.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::AnalysisError);
    assert!(failure.message.contains("provider unavailable"));
    assert!(failed.transcription.is_none());
    assert!(failed.emotion.is_none());
}

#[tokio::test]
async fn failed_rerun_preserves_previously_stored_results() {
    let fx = fixture("ayuda", EmotionClass::Fear);
    let id = ingest_sample(&fx.store, "U1");
    fx.pipeline.analyze(&id).await.unwrap();

    // explicit transcription re-run against a dead provider
    let retry = AnalysisPipeline::new(
        fx.store.clone(),
        Arc::new(InlineBlobStore::new()),
        Arc::new(FailingTranscription),
        Arc::new(FailingAnalyzer::new()),
        EvidenceConfig::default(),
    );
    let err = retry.transcribe(&id, None).await.unwrap_err();
    assert!(matches!(err, EvidenceError::Transcription(_)));

    let rec = retry.get(&id).unwrap();
    assert_eq!(rec.state, AnalysisState::Failed);
    assert_eq!(rec.failure.as_ref().unwrap().kind, FailureKind::TranscriptionError);
    // the completed results from the first run are untouched
    assert_eq!(rec.transcription.as_ref().unwrap().text, "ayuda");
    assert_eq!(rec.emotion.as_ref().unwrap().classification, EmotionClass::Fear);

    // retry from FAILED re-enters the pipeline and fails again, still preserving results
    let err = retry.analyze(&id).await.unwrap_err();
    assert!(matches!(err, EvidenceError::Analysis(_)));
    let rec = retry.get(&id).unwrap();
    assert_eq!(rec.failure.as_ref().unwrap().kind, FailureKind::AnalysisError);
    assert_eq!(rec.transcription.as_ref().unwrap().text, "ayuda");
}

#[tokio::test]
async fn unsupported_locator_fails_without_collaborator_calls() {
    let fx = fixture("ayuda", EmotionClass::Fear);
    let rec = fx
        .store
        .create(NewRecording {
            owner_id: "U1".to_string(),
            issue_id: None,
            locator: "https://cdn.example.com/audio/abc.webm".to_string(),
            filename: "abc.webm".to_string(),
            mime_type: "audio/webm".to_string(),
            size_bytes: 1024,
            duration_secs: 1.0,
            captured_at_ms: 0,
            location: None,
            notes: None,
            tags: vec![],
        })
        .unwrap();

    let err = fx.pipeline.analyze(&rec.id).await.unwrap_err();
    assert!(matches!(err, EvidenceError::Storage(_)));

    let failed = fx.pipeline.get(&rec.id).unwrap();
    assert_eq!(failed.state, AnalysisState::Failed);
    assert_eq!(failed.failure.unwrap().kind, FailureKind::StorageError);
    assert_eq!(fx.transcription.call_count(), 0);
    assert_eq!(fx.emotion.call_count(), 0);
}

#[tokio::test]
async fn soft_deleted_recordings_are_gone() {
    let fx = fixture("hola", EmotionClass::Neutral);
    let id = ingest_sample(&fx.store, "U1");
    fx.pipeline.delete(&id).unwrap();

    assert!(matches!(
        fx.pipeline.analyze(&id).await.unwrap_err(),
        EvidenceError::Gone(_)
    ));
    assert!(matches!(
        fx.pipeline.transcribe(&id, None).await.unwrap_err(),
        EvidenceError::Gone(_)
    ));
    assert!(matches!(
        fx.pipeline.get(&id).unwrap_err(),
        EvidenceError::NotFound(_)
    ));
    assert!(matches!(
        fx.pipeline.delete(&id).unwrap_err(),
        EvidenceError::Gone(_)
    ));
    assert!(matches!(
        fx.pipeline
            .update_notes(&id, Some("añadido tras borrar"))
            .unwrap_err(),
        EvidenceError::Gone(_)
    ));
    assert!(matches!(
        fx.pipeline
            .update_tags(&id, &["urgente".to_string()])
            .unwrap_err(),
        EvidenceError::Gone(_)
    ));

    let listed = fx
        .pipeline
        .list(&RecordingFilter {
            owner_id: Some("U1".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert!(listed.is_empty());
    assert_eq!(fx.transcription.call_count(), 0);
}

#[tokio::test]
async fn unknown_recording_is_not_found() {
    let fx = fixture("hola", EmotionClass::Neutral);
    let id = uuid::Uuid::new_v4().to_string();
    assert!(matches!(
        fx.pipeline.analyze(&id).await.unwrap_err(),
        EvidenceError::NotFound(_)
    ));
    assert!(matches!(
        fx.pipeline.get(&id).unwrap_err(),
        EvidenceError::NotFound(_)
    ));
}

#[tokio::test]
async fn transcription_rerun_overwrites_transcript_but_not_emotion() {
    let fx = fixture("primera versión", EmotionClass::Calm);
    let id = ingest_sample(&fx.store, "U1");
    fx.pipeline.analyze(&id).await.unwrap();

    let rerun = AnalysisPipeline::new(
        fx.store.clone(),
        Arc::new(InlineBlobStore::new()),
        Arc::new(FixedTranscription::with_text("segunda versión, socorro", "es")),
        Arc::new(FailingAnalyzer::new()),
        EvidenceConfig::default(),
    );
    let summary = rerun.transcribe(&id, Some("es".to_string())).await.unwrap();
    assert_eq!(summary.state, AnalysisState::Completed);
    assert_eq!(
        summary.transcription.as_ref().unwrap().text,
        "segunda versión, socorro"
    );
    // overwritten, not appended; emotion result untouched
    assert_eq!(
        summary.emotion.as_ref().unwrap().classification,
        EmotionClass::Calm
    );
    assert!(summary.is_emergency);
    assert_eq!(summary.emergency_keywords, vec!["socorro".to_string()]);
}

#[tokio::test]
async fn concurrent_analysis_lets_exactly_one_request_win() {
    let fx = fixture("hola", EmotionClass::Neutral);
    let id = ingest_sample(&fx.store, "U1");

    let (a, b) = tokio::join!(fx.pipeline.analyze(&id), fx.pipeline.analyze(&id));
    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(EvidenceError::Conflict(_))))
        .count();
    // both may serialize cleanly (second short-circuits), but a loser must
    // only ever see a Conflict, never a half-written record
    assert!(wins >= 1);
    assert_eq!(wins + conflicts, 2);

    let rec = fx.pipeline.get(&id).unwrap();
    assert_eq!(rec.state, AnalysisState::Completed);
}

#[tokio::test]
async fn storage_outage_after_analysis_surfaces_db_error() {
    let store = temp_store();
    let analyzer = Arc::new(LockingAnalyzer::new(store.path().to_path_buf()));
    let pipeline = AnalysisPipeline::new(
        store.clone(),
        Arc::new(InlineBlobStore::new()),
        Arc::new(FixedTranscription::new()),
        analyzer.clone(),
        EvidenceConfig::default(),
    );
    let id = ingest_sample(&store, "U1");

    // the analyzer succeeds, then every result write hits the locked DB
    let err = pipeline.analyze(&id).await.unwrap_err();
    assert!(matches!(err, EvidenceError::Db(_)));

    analyzer.release();
    // the failure capture shared the outage and was swallowed, so the
    // recording is left mid-flight with no stale results and no error record
    let rec = pipeline.get(&id).unwrap();
    assert_eq!(rec.state, AnalysisState::Processing);
    assert!(rec.failure.is_none());
    assert!(rec.transcription.is_none());
}

#[tokio::test]
async fn deletion_during_analysis_yields_conflict_not_completion() {
    let store = temp_store();
    let id = ingest_sample(&store, "U1");
    let analyzer = Arc::new(DeletingAnalyzer {
        store: store.clone(),
        id: id.clone(),
    });
    let pipeline = AnalysisPipeline::new(
        store.clone(),
        Arc::new(InlineBlobStore::new()),
        Arc::new(FixedTranscription::new()),
        analyzer,
        EvidenceConfig::default(),
    );

    let err = pipeline.analyze(&id).await.unwrap_err();
    assert!(matches!(err, EvidenceError::Conflict(_)));

    // the row is gone to callers and never reached COMPLETED
    let rec = store.get_any(&id).unwrap().unwrap();
    assert!(rec.is_deleted);
    assert_ne!(rec.state, AnalysisState::Completed);
}

#[tokio::test]
async fn in_flight_recording_rejects_new_analysis_requests() {
    let fx = fixture("hola", EmotionClass::Neutral);
    let id = ingest_sample(&fx.store, "U1");

    // another request already holds the recording in PROCESSING
    assert!(fx.store.begin_processing(&id, 0).unwrap());

    assert!(matches!(
        fx.pipeline.analyze(&id).await.unwrap_err(),
        EvidenceError::Conflict(_)
    ));
    assert!(matches!(
        fx.pipeline.transcribe(&id, None).await.unwrap_err(),
        EvidenceError::Conflict(_)
    ));
    // rejected before any collaborator call
    assert_eq!(fx.transcription.call_count(), 0);
    assert_eq!(fx.emotion.call_count(), 0);
}

#[tokio::test]
async fn transcribe_bytes_without_recording() {
    let fx = fixture("consulta general", EmotionClass::Neutral);
    let r = fx
        .pipeline
        .transcribe_bytes(&[1u8; 64], Some("es".to_string()))
        .await
        .unwrap();
    assert_eq!(r.text, "consulta general");
    assert_eq!(fx.transcription.call_count(), 1);
}

//! Pipeline orchestrator: ingestion → transcription → emotion analysis.
//!
//! Sequences the analysis steps against the recording store, owns the state
//! transitions, and captures collaborator failures durably on the recording
//! before surfacing them. Write ordering within one request is fixed: mark
//! PROCESSING before any collaborator call, write results before COMPLETED,
//! so a reader mid-flight sees either the pre-call state or a fully
//! consistent post-call state.

use crate::blob::BlobStore;
use crate::config::EvidenceConfig;
use crate::error::{EvidenceError, EvidenceResult};
use crate::recording::{AnalysisState, FailureKind, Recording, RecordingSummary};
use crate::store::{RecordingFilter, RecordingStore};
use std::sync::Arc;
use tracing::{info, warn};
use voxcase_analysis::{
    scan_transcript, AnalysisOptions, AudioAnalyzer, EmotionResult, TranscriptionBackend,
    TranscriptionOptions, TranscriptionResult,
};

/// Derive the emergency flag and keyword set from the two signals:
/// transcript keyword scan OR emotion danger classification.
fn emergency_union(
    transcript_text: &str,
    emotion: Option<&EmotionResult>,
) -> (bool, Vec<String>) {
    let keywords = scan_transcript(transcript_text);
    let danger = emotion.map(|e| e.classification.signals_danger()).unwrap_or(false);
    (!keywords.is_empty() || danger, keywords)
}

/// The voice evidence analysis pipeline.
pub struct AnalysisPipeline {
    store: Arc<RecordingStore>,
    blobs: Arc<dyn BlobStore>,
    transcription: Arc<dyn TranscriptionBackend>,
    analyzer: Arc<dyn AudioAnalyzer>,
    config: EvidenceConfig,
}

impl AnalysisPipeline {
    pub fn new(
        store: Arc<RecordingStore>,
        blobs: Arc<dyn BlobStore>,
        transcription: Arc<dyn TranscriptionBackend>,
        analyzer: Arc<dyn AudioAnalyzer>,
        config: EvidenceConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            transcription,
            analyzer,
            config,
        }
    }

    /// Load a recording, mapping absence to NotFound and soft-deletion to Gone.
    fn fetch_live(&self, id: &str) -> EvidenceResult<Recording> {
        match self.store.get_any(id)? {
            None => Err(EvidenceError::NotFound(id.to_string())),
            Some(rec) if rec.is_deleted => Err(EvidenceError::Gone(id.to_string())),
            Some(rec) => Ok(rec),
        }
    }

    /// Get a recording's full analysis view (payload excluded).
    pub fn get(&self, id: &str) -> EvidenceResult<RecordingSummary> {
        self.store
            .get(id)?
            .map(|r| r.summary())
            .ok_or_else(|| EvidenceError::NotFound(id.to_string()))
    }

    /// List recordings newest-first; soft-deleted rows never appear.
    pub fn list(&self, filter: &RecordingFilter) -> EvidenceResult<Vec<RecordingSummary>> {
        Ok(self.store.list(filter)?.into_iter().map(|r| r.summary()).collect())
    }

    /// Soft-delete a recording. Idempotence is not offered: deleting an
    /// already-deleted recording reports Gone.
    pub fn delete(&self, id: &str) -> EvidenceResult<()> {
        self.fetch_live(id)?;
        self.store.soft_delete(id)?;
        info!("recording {} soft-deleted", id);
        Ok(())
    }

    /// Update free-text notes (allowed in any analysis state).
    pub fn update_notes(&self, id: &str, notes: Option<&str>) -> EvidenceResult<RecordingSummary> {
        self.fetch_live(id)?;
        self.store.update_notes(id, notes)?;
        self.get(id)
    }

    /// Replace the tag set (allowed in any analysis state).
    pub fn update_tags(&self, id: &str, tags: &[String]) -> EvidenceResult<RecordingSummary> {
        self.fetch_live(id)?;
        self.store.update_tags(id, tags)?;
        self.get(id)
    }

    /// Transcribe a raw payload that has no recording yet. Pure passthrough
    /// to the collaborator; nothing is persisted.
    pub async fn transcribe_bytes(
        &self,
        audio: &[u8],
        language: Option<String>,
    ) -> EvidenceResult<TranscriptionResult> {
        let opts = TranscriptionOptions {
            language: language.or_else(|| Some(self.config.default_language.clone())),
        };
        self.transcription
            .transcribe(audio, &opts)
            .await
            .map_err(|e| EvidenceError::Transcription(e.to_string()))
    }

    /// Run the transcription step for a stored recording.
    ///
    /// Re-invocation overwrites the previous transcription result; a stored
    /// emotion result is left untouched. The emergency flag is recomputed
    /// from the new transcript ORed with the stored emotion signal.
    pub async fn transcribe(
        &self,
        id: &str,
        language: Option<String>,
    ) -> EvidenceResult<RecordingSummary> {
        let rec = self.fetch_live(id)?;
        if !rec.state.allows_transition(AnalysisState::Processing) {
            return Err(EvidenceError::Conflict(id.to_string()));
        }

        let audio = match self.blobs.get(&rec.locator) {
            Ok(bytes) => bytes,
            Err(e) => {
                let msg = e.to_string();
                self.record_failure(id, FailureKind::StorageError, &msg);
                return Err(EvidenceError::Storage(msg));
            }
        };

        // Durable intent marker: a crash mid-call is observable on next read.
        if !self.store.begin_processing(id, rec.revision)? {
            return Err(EvidenceError::Conflict(id.to_string()));
        }

        let opts = TranscriptionOptions {
            language: language.or_else(|| Some(self.config.default_language.clone())),
        };
        let result = match self.transcription.transcribe(&audio, &opts).await {
            Ok(r) => r,
            Err(e) => {
                let msg = e.to_string();
                self.record_failure(id, FailureKind::TranscriptionError, &msg);
                return Err(EvidenceError::Transcription(msg));
            }
        };

        let (is_emergency, keywords) = emergency_union(&result.text, rec.emotion.as_ref());
        self.persist_outcome(
            id,
            FailureKind::TranscriptionError,
            self.store
                .store_transcription(id, &result, is_emergency, &keywords)
                .and_then(|()| self.store.complete(id)),
        )?;
        info!(
            "recording {} transcribed ({} chars, emergency={})",
            id,
            result.text.len(),
            is_emergency
        );
        self.get(id)
    }

    /// Run the full analysis (transcription + emotion) as one logical unit.
    ///
    /// Idempotent for COMPLETED recordings: the stored results are returned
    /// unchanged and no collaborator is invoked.
    pub async fn analyze(&self, id: &str) -> EvidenceResult<RecordingSummary> {
        let rec = self.fetch_live(id)?;

        if rec.state == AnalysisState::Completed {
            info!("recording {} already analyzed, returning stored results", id);
            return Ok(rec.summary());
        }
        if !rec.state.allows_transition(AnalysisState::Processing) {
            return Err(EvidenceError::Conflict(id.to_string()));
        }

        let audio = match self.blobs.get(&rec.locator) {
            Ok(bytes) => bytes,
            Err(e) => {
                let msg = e.to_string();
                self.record_failure(id, FailureKind::StorageError, &msg);
                return Err(EvidenceError::Storage(msg));
            }
        };

        if !self.store.begin_processing(id, rec.revision)? {
            return Err(EvidenceError::Conflict(id.to_string()));
        }

        let opts = AnalysisOptions {
            transcription: TranscriptionOptions {
                language: Some(self.config.default_language.clone()),
            },
            ..Default::default()
        };
        let combined = match self.analyzer.analyze_audio(&audio, &opts).await {
            Ok(c) => c,
            Err(e) => {
                // Previously stored results stay untouched; only the state
                // and error record change.
                let msg = e.to_string();
                self.record_failure(id, FailureKind::AnalysisError, &msg);
                return Err(EvidenceError::Analysis(msg));
            }
        };

        let (is_emergency, keywords) =
            emergency_union(&combined.transcription.text, Some(&combined.emotion));
        self.persist_outcome(
            id,
            FailureKind::CompleteAnalysisError,
            self.store
                .store_transcription(id, &combined.transcription, is_emergency, &keywords)
                .and_then(|()| {
                    self.store
                        .store_emotion(id, &combined.emotion, is_emergency, &keywords)
                })
                .and_then(|()| self.store.complete(id)),
        )?;
        info!(
            "recording {} analyzed: emotion={}, emergency={}",
            id,
            combined.emotion.classification.as_str(),
            is_emergency
        );
        self.get(id)
    }

    /// Land a result-write/complete sequence after the PROCESSING transition.
    /// A persistence error is captured on the recording (best effort) before
    /// surfacing, same as a collaborator error. A completion that matched no
    /// PROCESSING row means a concurrent request took the recording over.
    fn persist_outcome(
        &self,
        id: &str,
        kind: FailureKind,
        outcome: EvidenceResult<bool>,
    ) -> EvidenceResult<()> {
        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(EvidenceError::Conflict(id.to_string())),
            Err(e) => {
                self.record_failure(id, kind, &e.to_string());
                Err(e)
            }
        }
    }

    /// Named fallback for failures occurring after processing began: persist
    /// the FAILED state so the outcome is durably observable, and swallow any
    /// secondary persistence error rather than mask the primary one.
    fn record_failure(&self, id: &str, kind: FailureKind, message: &str) {
        if let Err(e) = self.store.fail(id, kind, message) {
            warn!(
                "failed to persist {} failure for recording {}: {}",
                kind.as_str(),
                id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxcase_analysis::{EmotionClass, EmotionResult};

    #[test]
    fn emergency_union_from_keywords_alone() {
        let (flag, kws) = emergency_union("ayuda por favor", None);
        assert!(flag);
        assert_eq!(kws, vec!["ayuda".to_string()]);
    }

    #[test]
    fn emergency_union_from_emotion_alone() {
        let emotion = EmotionResult {
            classification: EmotionClass::Fear,
            confidence: 0.9,
            signals: vec![],
        };
        let (flag, kws) = emergency_union("todo tranquilo", Some(&emotion));
        assert!(flag);
        assert!(kws.is_empty());
    }

    #[test]
    fn emergency_union_neither_signal() {
        let emotion = EmotionResult {
            classification: EmotionClass::Calm,
            confidence: 0.9,
            signals: vec![],
        };
        let (flag, kws) = emergency_union("todo tranquilo", Some(&emotion));
        assert!(!flag);
        assert!(kws.is_empty());
    }
}

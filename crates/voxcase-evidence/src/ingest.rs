//! Audio ingestion: validate an uploaded payload and create a PENDING recording.

use crate::blob::BlobStore;
use crate::config::{EvidenceConfig, ALLOWED_AUDIO_TYPES};
use crate::error::{EvidenceError, EvidenceResult};
use crate::recording::{GeoPoint, RecordingSummary};
use crate::store::{NewRecording, RecordingStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// An uploaded audio payload plus its descriptive metadata.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
    pub owner_id: String,
    pub issue_id: Option<String>,
    /// Duration in seconds when the client captured it; estimated otherwise.
    pub duration_secs: Option<f64>,
    /// Capture time; defaults to now.
    pub captured_at_ms: Option<i64>,
    pub location: Option<GeoPoint>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

/// Rough duration estimate when the client sent none. Browser voice
/// recordings land near 16 kB/s, so bytes/16000 is close enough for
/// list views and quota checks.
fn estimate_duration_secs(size_bytes: i64) -> f64 {
    (size_bytes as f64 / 16_000.0).round()
}

/// Validate a payload against the configured limits. Returns every violated
/// constraint, not just the first.
pub fn validate_audio(bytes: &[u8], mime_type: &str, max_bytes: i64) -> Vec<String> {
    let mut violations = Vec::new();
    if bytes.is_empty() {
        violations.push("audio payload is empty".to_string());
    }
    if !ALLOWED_AUDIO_TYPES.contains(&mime_type) {
        violations.push(format!(
            "unsupported audio type '{}' (accepted: {})",
            mime_type,
            ALLOWED_AUDIO_TYPES.join(", ")
        ));
    }
    if bytes.len() as i64 > max_bytes {
        violations.push(format!(
            "payload of {} bytes exceeds the {} byte limit",
            bytes.len(),
            max_bytes
        ));
    }
    violations
}

/// Creates recordings from validated uploads.
pub struct Ingestor {
    store: Arc<RecordingStore>,
    blobs: Arc<dyn BlobStore>,
    config: EvidenceConfig,
}

impl Ingestor {
    pub fn new(store: Arc<RecordingStore>, blobs: Arc<dyn BlobStore>, config: EvidenceConfig) -> Self {
        Self {
            store,
            blobs,
            config,
        }
    }

    /// Validate, store the payload, and create a PENDING recording.
    /// On validation failure nothing is persisted. The returned summary never
    /// echoes the payload or its locator.
    pub fn ingest(&self, req: IngestRequest) -> EvidenceResult<RecordingSummary> {
        let violations = validate_audio(&req.bytes, &req.mime_type, self.config.max_upload_bytes);
        if !violations.is_empty() {
            return Err(EvidenceError::Validation(violations));
        }

        let locator = self.blobs.put(&req.bytes, &req.mime_type)?;
        let size_bytes = req.bytes.len() as i64;
        let duration_secs = req
            .duration_secs
            .filter(|d| *d > 0.0)
            .unwrap_or_else(|| estimate_duration_secs(size_bytes));

        let recording = self.store.create(NewRecording {
            owner_id: req.owner_id,
            issue_id: req.issue_id,
            locator,
            filename: req.filename,
            mime_type: req.mime_type,
            size_bytes,
            duration_secs,
            captured_at_ms: req.captured_at_ms.unwrap_or_else(|| Utc::now().timestamp_millis()),
            location: req.location,
            notes: req.notes,
            tags: req.tags,
        })?;

        info!(
            "ingested recording {} ({} bytes, {:.0}s) for owner {}",
            recording.id, recording.size_bytes, recording.duration_secs, recording.owner_id
        );
        Ok(recording.summary())
    }
}

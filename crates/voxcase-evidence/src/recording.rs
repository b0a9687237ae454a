//! The `Recording` model: one voice-evidence capture and its analysis state.

use serde::{Deserialize, Serialize};
use voxcase_analysis::{EmotionResult, TranscriptionResult};

/// Lifecycle stage of a recording's analysis.
///
/// `Pending → Processing → Completed` is the only successful path.
/// `Processing → Failed` may occur from any analysis step; a retry re-enters
/// `Processing`. `Completed` is only left by an explicit re-run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisState {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisState::Pending => "PENDING",
            AnalysisState::Processing => "PROCESSING",
            AnalysisState::Completed => "COMPLETED",
            AnalysisState::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AnalysisState::Pending),
            "PROCESSING" => Some(AnalysisState::Processing),
            "COMPLETED" => Some(AnalysisState::Completed),
            "FAILED" => Some(AnalysisState::Failed),
            _ => None,
        }
    }

    /// Whether `self → to` is a legal transition.
    pub fn allows_transition(self, to: AnalysisState) -> bool {
        use AnalysisState::*;
        matches!(
            (self, to),
            (Pending, Processing)
                // storage resolution can fail before processing begins
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
                // explicit re-run of an already-analyzed recording
                | (Completed, Processing)
        )
    }
}

impl std::fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error-kind code persisted on a failed recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    TranscriptionError,
    AnalysisError,
    CompleteAnalysisError,
    StorageError,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::TranscriptionError => "TRANSCRIPTION_ERROR",
            FailureKind::AnalysisError => "ANALYSIS_ERROR",
            FailureKind::CompleteAnalysisError => "COMPLETE_ANALYSIS_ERROR",
            FailureKind::StorageError => "STORAGE_ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TRANSCRIPTION_ERROR" => Some(FailureKind::TranscriptionError),
            "ANALYSIS_ERROR" => Some(FailureKind::AnalysisError),
            "COMPLETE_ANALYSIS_ERROR" => Some(FailureKind::CompleteAnalysisError),
            "STORAGE_ERROR" => Some(FailureKind::StorageError),
            _ => None,
        }
    }
}

/// Failure record kept on a recording in FAILED state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub message: String,
    pub kind: FailureKind,
    pub failed_at_ms: i64,
}

/// Optional capture geolocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, when the device reported one.
    pub accuracy_m: Option<f64>,
}

/// One voice recording and its analysis results.
///
/// The `locator` resolves to the raw audio payload via the blob store and is
/// never exposed to clients; use [`RecordingSummary`] for anything
/// caller-facing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    pub owner_id: String,
    pub issue_id: Option<String>,
    pub locator: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub duration_secs: f64,
    pub captured_at_ms: i64,
    pub location: Option<GeoPoint>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub state: AnalysisState,
    pub transcription: Option<TranscriptionResult>,
    pub emotion: Option<EmotionResult>,
    pub is_emergency: bool,
    pub emergency_keywords: Vec<String>,
    pub failure: Option<AnalysisFailure>,
    pub is_deleted: bool,
    /// Optimistic-concurrency counter, bumped on every state transition.
    pub revision: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Recording {
    /// Caller-facing view: everything except the storage locator.
    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            issue_id: self.issue_id.clone(),
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
            duration_secs: self.duration_secs,
            captured_at_ms: self.captured_at_ms,
            location: self.location,
            notes: self.notes.clone(),
            tags: self.tags.clone(),
            state: self.state,
            transcription: self.transcription.clone(),
            emotion: self.emotion.clone(),
            is_emergency: self.is_emergency,
            emergency_keywords: self.emergency_keywords.clone(),
            failure: self.failure.clone(),
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
        }
    }
}

/// What callers see: the full recording minus the raw payload locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub id: String,
    pub owner_id: String,
    pub issue_id: Option<String>,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub duration_secs: f64,
    pub captured_at_ms: i64,
    pub location: Option<GeoPoint>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub state: AnalysisState,
    pub transcription: Option<TranscriptionResult>,
    pub emotion: Option<EmotionResult>,
    pub is_emergency: bool,
    pub emergency_keywords: Vec<String>,
    pub failure: Option<AnalysisFailure>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

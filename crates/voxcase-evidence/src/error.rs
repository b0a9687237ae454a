//! Error types for the evidence core

use thiserror::Error;

/// Result type alias for evidence operations
pub type EvidenceResult<T> = Result<T, EvidenceError>;

/// Errors surfaced by the recording store and the analysis pipeline.
///
/// Precondition failures (`Validation`, `NotFound`, `Gone`) are raised before
/// any state mutation. `Storage`, `Transcription` and `Analysis` failures that
/// occur after a recording entered PROCESSING are also persisted on the
/// recording itself before being returned.
#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Recording not found: {0}")]
    NotFound(String),

    #[error("Recording deleted: {0}")]
    Gone(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Concurrent modification of recording {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvidenceError {
    /// Whether a caller may reasonably retry the operation. Collaborator and
    /// contention failures are retryable; precondition failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EvidenceError::Transcription(_)
                | EvidenceError::Analysis(_)
                | EvidenceError::Conflict(_)
        )
    }
}

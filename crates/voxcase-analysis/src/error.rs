//! Error types for the analysis collaborator layer

use thiserror::Error;

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors that can occur while talking to analysis collaborators
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Emotion analysis error: {0}")]
    Emotion(String),

    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

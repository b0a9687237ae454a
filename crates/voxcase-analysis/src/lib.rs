//! # Voxcase Analysis - Voice Evidence Collaborators
//!
//! This crate implements the external-analysis side of the voice evidence
//! pipeline: transcription, emotion classification, and emergency keyword
//! scanning, behind backend traits so hosted APIs and offline placeholders
//! are interchangeable.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ComposedAnalyzer                        │
//! │  ┌────────────────────┐      ┌────────────────────┐         │
//! │  │ TranscriptionBack. │  →   │  EmotionBackend    │         │
//! │  │ (HTTP / Fixed)     │      │  (HTTP / Fixed)    │         │
//! │  └────────────────────┘      └────────────────────┘         │
//! │            ↓                            ↓                   │
//! │      transcript text  ──► emergency keyword scan            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod combined;
pub mod emergency;
pub mod emotion;
pub mod error;
pub mod transcription;

pub use combined::{AnalysisOptions, AudioAnalyzer, CombinedAnalysis, ComposedAnalyzer};
pub use emergency::{scan_transcript, EMERGENCY_KEYWORDS};
pub use emotion::{
    create_best_emotion, EmotionBackend, EmotionClass, EmotionOptions, EmotionResult, FixedEmotion,
    HttpEmotion,
};
pub use error::{AnalysisError, AnalysisResult};
pub use transcription::{
    create_best_transcription, FixedTranscription, HttpTranscription, TranscriptSegment,
    TranscriptionBackend, TranscriptionOptions, TranscriptionResult,
};

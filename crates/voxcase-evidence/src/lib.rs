//! Voxcase evidence core: recording store, audio ingestion, and the analysis
//! pipeline orchestrator.
//!
//! Data flow: client uploads audio → [`Ingestor`] creates a PENDING
//! [`Recording`] → [`AnalysisPipeline`] drives transcription and emotion
//! analysis via `voxcase-analysis` collaborators → recording lands COMPLETED
//! (or FAILED with a captured error record) → clients read through the
//! soft-delete-aware [`RecordingStore`].

pub mod blob;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod recording;
pub mod store;

pub use blob::{blob_store_for, BlobStore, InlineBlobStore};
pub use config::{EvidenceConfig, ALLOWED_AUDIO_TYPES};
pub use error::{EvidenceError, EvidenceResult};
pub use ingest::{validate_audio, IngestRequest, Ingestor};
pub use pipeline::AnalysisPipeline;
pub use recording::{
    AnalysisFailure, AnalysisState, FailureKind, GeoPoint, Recording, RecordingSummary,
};
pub use store::{NewRecording, RecordingFilter, RecordingStore};

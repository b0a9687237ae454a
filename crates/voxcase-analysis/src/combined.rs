//! **Combined analysis** — run transcription and emotion classification as
//! one logical unit, so both results land together or not at all.

use crate::emotion::{EmotionBackend, EmotionOptions, EmotionResult};
use crate::error::AnalysisResult;
use crate::transcription::{TranscriptionBackend, TranscriptionOptions, TranscriptionResult};
use std::sync::Arc;
use tracing::debug;

/// Options for a combined analysis call.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub transcription: TranscriptionOptions,
    pub emotion: EmotionOptions,
}

/// Both analysis results for one audio payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedAnalysis {
    pub transcription: TranscriptionResult,
    pub emotion: EmotionResult,
}

/// The combined analysis collaborator. A single failure from either sub-step
/// fails the whole call; callers get both results or neither.
#[async_trait::async_trait]
pub trait AudioAnalyzer: Send + Sync {
    async fn analyze_audio(
        &self,
        audio: &[u8],
        opts: &AnalysisOptions,
    ) -> AnalysisResult<CombinedAnalysis>;
}

/// Default analyzer: composes a transcription backend and an emotion backend.
pub struct ComposedAnalyzer {
    transcription: Arc<dyn TranscriptionBackend>,
    emotion: Arc<dyn EmotionBackend>,
}

impl ComposedAnalyzer {
    pub fn new(
        transcription: Arc<dyn TranscriptionBackend>,
        emotion: Arc<dyn EmotionBackend>,
    ) -> Self {
        Self {
            transcription,
            emotion,
        }
    }
}

#[async_trait::async_trait]
impl AudioAnalyzer for ComposedAnalyzer {
    async fn analyze_audio(
        &self,
        audio: &[u8],
        opts: &AnalysisOptions,
    ) -> AnalysisResult<CombinedAnalysis> {
        let transcription = self.transcription.transcribe(audio, &opts.transcription).await?;
        debug!("combined analysis: transcript {} chars", transcription.text.len());
        let emotion = self.emotion.classify(audio, &opts.emotion).await?;
        debug!("combined analysis: emotion {}", emotion.classification.as_str());
        Ok(CombinedAnalysis {
            transcription,
            emotion,
        })
    }
}

//! **Emotion classification** — derive an emotional signal from audio bytes.
//!
//! Same seam as transcription: an `EmotionBackend` trait with an HTTP
//! implementation for a hosted classifier and a fixed implementation for
//! tests/offline runs.

use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Emotion classes the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionClass {
    Calm,
    Neutral,
    Sad,
    Angry,
    Fear,
    Distress,
    Panic,
}

impl EmotionClass {
    /// Whether this classification by itself signals an in-progress emergency.
    pub fn signals_danger(self) -> bool {
        matches!(self, EmotionClass::Fear | EmotionClass::Distress | EmotionClass::Panic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionClass::Calm => "calm",
            EmotionClass::Neutral => "neutral",
            EmotionClass::Sad => "sad",
            EmotionClass::Angry => "angry",
            EmotionClass::Fear => "fear",
            EmotionClass::Distress => "distress",
            EmotionClass::Panic => "panic",
        }
    }
}

/// Typed emotion result, validated at the collaborator boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub classification: EmotionClass,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
    /// Free-form signal labels reported by the classifier (e.g. "raised-voice").
    #[serde(default)]
    pub signals: Vec<String>,
}

/// Options passed to an emotion backend. Currently empty; kept as a struct so
/// the contract can grow without breaking implementors.
#[derive(Debug, Clone, Default)]
pub struct EmotionOptions {}

/// Backend for classifying the emotional content of an audio payload.
#[async_trait::async_trait]
pub trait EmotionBackend: Send + Sync {
    async fn classify(&self, audio: &[u8], opts: &EmotionOptions) -> AnalysisResult<EmotionResult>;
}

/// Fixed emotion backend: returns a preset classification and counts calls.
#[derive(Debug)]
pub struct FixedEmotion {
    pub response: EmotionResult,
    calls: AtomicUsize,
}

impl Default for FixedEmotion {
    fn default() -> Self {
        Self {
            response: EmotionResult {
                classification: EmotionClass::Neutral,
                confidence: 0.0,
                signals: Vec::new(),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

impl FixedEmotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(classification: EmotionClass, confidence: f64) -> Self {
        Self {
            response: EmotionResult {
                classification,
                confidence,
                signals: Vec::new(),
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `classify` has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmotionBackend for FixedEmotion {
    async fn classify(&self, _audio: &[u8], _opts: &EmotionOptions) -> AnalysisResult<EmotionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Production emotion backend: posts raw audio to a hosted classifier that
/// answers `{classification, confidence, signals}` JSON.
/// Uses `VOXCASE_EMOTION_API_URL` and `VOXCASE_EMOTION_API_KEY`.
#[derive(Debug, Clone)]
pub struct HttpEmotion {
    pub url: String,
    pub api_key: String,
    client: reqwest::Client,
}

impl HttpEmotion {
    /// Build from environment: VOXCASE_EMOTION_API_URL, VOXCASE_EMOTION_API_KEY.
    pub fn from_env() -> AnalysisResult<Self> {
        let url = std::env::var("VOXCASE_EMOTION_API_URL")
            .map_err(|_| AnalysisError::Config("emotion analysis requires VOXCASE_EMOTION_API_URL".to_string()))?;
        let api_key = std::env::var("VOXCASE_EMOTION_API_KEY").unwrap_or_default();
        Self::new(url, api_key)
    }

    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> AnalysisResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| AnalysisError::Emotion(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl EmotionBackend for HttpEmotion {
    async fn classify(&self, audio: &[u8], _opts: &EmotionOptions) -> AnalysisResult<EmotionResult> {
        if audio.is_empty() {
            return Err(AnalysisError::InvalidAudio("empty audio payload".to_string()));
        }
        let mut req = self
            .client
            .post(&self.url)
            .header("content-type", "application/octet-stream")
            .body(audio.to_vec());
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let res = req
            .send()
            .await
            .map_err(|e| AnalysisError::Emotion(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AnalysisError::Emotion(format!(
                "emotion API error {}: {}",
                status, body
            )));
        }
        let result: EmotionResult = res
            .json()
            .await
            .map_err(|e| AnalysisError::Emotion(format!("malformed emotion response: {}", e)))?;
        if !(0.0..=1.0).contains(&result.confidence) {
            return Err(AnalysisError::Emotion(format!(
                "confidence out of range: {}",
                result.confidence
            )));
        }
        Ok(result)
    }
}

/// Create the best available emotion backend from environment.
/// Priority: (1) HttpEmotion if `VOXCASE_EMOTION_API_URL` is set,
/// (2) FixedEmotion neutral placeholder.
pub fn create_best_emotion() -> AnalysisResult<Box<dyn EmotionBackend>> {
    if let Ok(http) = HttpEmotion::from_env() {
        return Ok(Box::new(http));
    }
    Ok(Box::new(FixedEmotion::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn danger_classes() {
        assert!(EmotionClass::Fear.signals_danger());
        assert!(EmotionClass::Distress.signals_danger());
        assert!(EmotionClass::Panic.signals_danger());
        assert!(!EmotionClass::Calm.signals_danger());
        assert!(!EmotionClass::Angry.signals_danger());
    }

    #[test]
    fn class_serializes_lowercase() {
        let json = serde_json::to_string(&EmotionClass::Fear).unwrap();
        assert_eq!(json, "\"fear\"");
        let back: EmotionClass = serde_json::from_str("\"distress\"").unwrap();
        assert_eq!(back, EmotionClass::Distress);
    }

    #[tokio::test]
    async fn fixed_returns_preset_and_counts() {
        let backend = FixedEmotion::with_class(EmotionClass::Fear, 0.9);
        let r = backend.classify(&[0u8; 16], &EmotionOptions::default()).await.unwrap();
        assert_eq!(r.classification, EmotionClass::Fear);
        assert_eq!(backend.call_count(), 1);
    }
}

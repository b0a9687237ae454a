//! **Transcription** — convert uploaded audio bytes into transcript text.
//!
//! Implement `TranscriptionBackend` for a hosted speech-to-text API or a
//! local engine. `HttpTranscription` targets any OpenAI-compatible
//! `/audio/transcriptions` endpoint; `FixedTranscription` is the offline
//! backend used in tests and when no API key is configured.

use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One timed segment of a transcript, as returned by verbose providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

/// Typed transcription result. Validated at the collaborator boundary so the
/// rest of the pipeline never handles loose JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Full transcript text, trimmed.
    pub text: String,
    /// BCP-47-ish language tag reported by the provider (e.g. "es", "en").
    pub language: String,
    /// Timed segments when the provider returns them; empty otherwise.
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

/// Options passed to a transcription backend.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionOptions {
    /// Language hint for the provider (e.g. "es"). None lets the provider detect.
    pub language: Option<String>,
}

/// Backend for converting audio bytes to a transcript.
#[async_trait::async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe one audio payload. Return an empty transcript if nothing was detected.
    async fn transcribe(
        &self,
        audio: &[u8],
        opts: &TranscriptionOptions,
    ) -> AnalysisResult<TranscriptionResult>;
}

/// Fixed transcription backend: returns a preset result and counts invocations.
/// Use for tests and for running the pipeline without a speech-to-text provider.
#[derive(Debug, Default)]
pub struct FixedTranscription {
    /// If set, return this instead of the default placeholder transcript.
    pub response: Option<TranscriptionResult>,
    calls: AtomicUsize,
}

impl FixedTranscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            response: Some(TranscriptionResult {
                text: text.into(),
                language: language.into(),
                segments: Vec::new(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `transcribe` has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for FixedTranscription {
    async fn transcribe(
        &self,
        audio: &[u8],
        opts: &TranscriptionOptions,
    ) -> AnalysisResult<TranscriptionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref r) = self.response {
            return Ok(r.clone());
        }
        Ok(TranscriptionResult {
            text: format!(
                "[transcription placeholder: {} bytes — configure VOXCASE_STT_API_KEY for a real provider]",
                audio.len()
            ),
            language: opts.language.clone().unwrap_or_else(|| "es".to_string()),
            segments: Vec::new(),
        })
    }
}

/// Production transcription backend: OpenAI-compatible transcription API.
/// Uses `VOXCASE_STT_API_URL` (e.g. https://api.openai.com/v1),
/// `VOXCASE_STT_API_KEY`, and `VOXCASE_STT_MODEL` (default whisper-1).
#[derive(Debug, Clone)]
pub struct HttpTranscription {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// Model: whisper-1 or gpt-4o-transcribe, etc.
    pub model: String,
    client: reqwest::Client,
}

impl HttpTranscription {
    /// Build from environment: VOXCASE_STT_API_URL, VOXCASE_STT_API_KEY, VOXCASE_STT_MODEL.
    pub fn from_env() -> AnalysisResult<Self> {
        let base_url = std::env::var("VOXCASE_STT_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("VOXCASE_STT_API_KEY")
            .map_err(|_| AnalysisError::Config("transcription requires VOXCASE_STT_API_KEY".to_string()))?;
        let model = std::env::var("VOXCASE_STT_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        Self::new(base_url, api_key, model)
    }

    /// Create with explicit config.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> AnalysisResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| AnalysisError::Transcription(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

/// Shape of the OpenAI verbose_json transcription response we consume.
#[derive(Debug, Deserialize)]
struct ApiTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<ApiSegment>,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    start: f64,
    end: f64,
    text: String,
}

#[async_trait::async_trait]
impl TranscriptionBackend for HttpTranscription {
    async fn transcribe(
        &self,
        audio: &[u8],
        opts: &TranscriptionOptions,
    ) -> AnalysisResult<TranscriptionResult> {
        if audio.is_empty() {
            return Err(AnalysisError::InvalidAudio("empty audio payload".to_string()));
        }
        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.webm")
            .mime_str("application/octet-stream")
            .map_err(|e| AnalysisError::Transcription(e.to_string()))?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json".to_string());
        if let Some(ref lang) = opts.language {
            form = form.text("language", lang.clone());
        }
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalysisError::Transcription(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AnalysisError::Transcription(format!(
                "transcription API error {}: {}",
                status, body
            )));
        }
        let api: ApiTranscription = res
            .json()
            .await
            .map_err(|e| AnalysisError::Transcription(e.to_string()))?;
        Ok(TranscriptionResult {
            text: api.text.trim().to_string(),
            language: api
                .language
                .or_else(|| opts.language.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            segments: api
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    start_sec: s.start,
                    end_sec: s.end,
                    text: s.text.trim().to_string(),
                })
                .collect(),
        })
    }
}

/// Create the best available transcription backend from environment.
/// Priority: (1) HttpTranscription if `VOXCASE_STT_API_KEY` is set,
/// (2) FixedTranscription placeholder.
pub fn create_best_transcription() -> AnalysisResult<Box<dyn TranscriptionBackend>> {
    if let Ok(http) = HttpTranscription::from_env() {
        return Ok(Box::new(http));
    }
    Ok(Box::new(FixedTranscription::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_returns_placeholder() {
        let stt = FixedTranscription::new();
        let r = stt
            .transcribe(&[0u8; 480], &TranscriptionOptions::default())
            .await
            .unwrap();
        assert!(r.text.contains("placeholder"));
        assert!(r.text.contains("480"));
        assert_eq!(stt.call_count(), 1);
    }

    #[tokio::test]
    async fn fixed_with_preset_response() {
        let stt = FixedTranscription::with_text("hola mundo", "es");
        let opts = TranscriptionOptions {
            language: Some("es".to_string()),
        };
        let r = stt.transcribe(&[], &opts).await.unwrap();
        assert_eq!(r.text, "hola mundo");
        assert_eq!(r.language, "es");
        assert!(r.segments.is_empty());
    }

    #[tokio::test]
    async fn fixed_counts_every_call() {
        let stt = FixedTranscription::with_text("x", "en");
        let opts = TranscriptionOptions::default();
        stt.transcribe(&[1], &opts).await.unwrap();
        stt.transcribe(&[2], &opts).await.unwrap();
        assert_eq!(stt.call_count(), 2);
    }
}

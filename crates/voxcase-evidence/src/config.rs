//! Evidence configuration loaded from environment.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | VOXCASE_STORAGE_PATH | ./data | Base directory for the SQLite DB. |
//! | VOXCASE_MAX_UPLOAD_BYTES | 10485760 | Upload size ceiling (10 MB). |
//! | VOXCASE_STORAGE_PROVIDER | inline | Blob provider for audio payloads. |
//! | VOXCASE_DEFAULT_LANGUAGE | es | Transcription language hint. |

use serde::{Deserialize, Serialize};

/// Accepted upload MIME types. Matches what browser and mobile recorders emit.
pub const ALLOWED_AUDIO_TYPES: &[&str] = &[
    "audio/webm",
    "audio/ogg",
    "audio/wav",
    "audio/x-wav",
    "audio/mpeg",
    "audio/mp4",
    "audio/aac",
    "audio/x-m4a",
    "audio/3gpp",
];

fn default_max_upload_bytes() -> i64 {
    10 * 1024 * 1024
}

fn default_storage_provider() -> String {
    "inline".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

/// Runtime configuration for the evidence core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// VOXCASE_MAX_UPLOAD_BYTES: reject uploads larger than this.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: i64,
    /// VOXCASE_STORAGE_PROVIDER: blob provider name ("inline" is built in).
    #[serde(default = "default_storage_provider")]
    pub storage_provider: String,
    /// VOXCASE_DEFAULT_LANGUAGE: language hint passed to transcription.
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            storage_provider: default_storage_provider(),
            default_language: default_language(),
        }
    }
}

impl EvidenceConfig {
    /// Load from environment, falling back to defaults per field.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("VOXCASE_MAX_UPLOAD_BYTES") {
            if let Ok(n) = v.trim().parse::<i64>() {
                if n > 0 {
                    cfg.max_upload_bytes = n;
                }
            }
        }
        if let Ok(v) = std::env::var("VOXCASE_STORAGE_PROVIDER") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.storage_provider = v.to_string();
            }
        }
        if let Ok(v) = std::env::var("VOXCASE_DEFAULT_LANGUAGE") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.default_language = v.to_string();
            }
        }
        cfg
    }
}

//! Blob storage for raw audio payloads.
//!
//! A recording holds a locator string; the blob store resolves it to bytes.
//! The reference provider inlines the payload as a `data:` URI so the core
//! works without any external object store. Other providers can be added
//! behind the same trait.

use crate::error::{EvidenceError, EvidenceResult};
use base64::Engine;
use std::sync::Arc;

/// Resolves storage locators to raw audio bytes and mints new locators.
pub trait BlobStore: Send + Sync {
    /// Store a payload and return its locator.
    fn put(&self, bytes: &[u8], mime_type: &str) -> EvidenceResult<String>;
    /// Resolve a locator back to raw bytes.
    fn get(&self, locator: &str) -> EvidenceResult<Vec<u8>>;
}

/// Inline provider: `data:<mime>;base64,<payload>`. The payload lives inside
/// the locator itself, so the recording row is the single source of truth.
#[derive(Debug, Default)]
pub struct InlineBlobStore;

impl InlineBlobStore {
    pub fn new() -> Self {
        Self
    }
}

impl BlobStore for InlineBlobStore {
    fn put(&self, bytes: &[u8], mime_type: &str) -> EvidenceResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:{};base64,{}", mime_type, encoded))
    }

    fn get(&self, locator: &str) -> EvidenceResult<Vec<u8>> {
        let rest = locator
            .strip_prefix("data:")
            .ok_or_else(|| EvidenceError::Storage(format!("unrecognized locator scheme: {}", scheme_of(locator))))?;
        let (_mime, payload) = rest.split_once(";base64,").ok_or_else(|| {
            EvidenceError::Storage("inline locator is not base64-encoded".to_string())
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| EvidenceError::Storage(format!("inline payload decode failed: {}", e)))
    }
}

fn scheme_of(locator: &str) -> &str {
    locator.split(':').next().unwrap_or(locator)
}

/// Select a blob store by the configured provider name.
pub fn blob_store_for(provider: &str) -> EvidenceResult<Arc<dyn BlobStore>> {
    match provider {
        "inline" => Ok(Arc::new(InlineBlobStore::new())),
        other => Err(EvidenceError::Storage(format!(
            "unknown storage provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_round_trip() {
        let store = InlineBlobStore::new();
        let payload = b"not really audio";
        let locator = store.put(payload, "audio/webm").unwrap();
        assert!(locator.starts_with("data:audio/webm;base64,"));
        assert_eq!(store.get(&locator).unwrap(), payload);
    }

    #[test]
    fn rejects_non_inline_scheme() {
        let store = InlineBlobStore::new();
        let err = store.get("https://cdn.example.com/audio/abc.webm").unwrap_err();
        match err {
            EvidenceError::Storage(msg) => assert!(msg.contains("https")),
            other => panic!("expected Storage error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_inline() {
        let store = InlineBlobStore::new();
        assert!(store.get("data:audio/webm,plaintext").is_err());
        assert!(store.get("data:audio/webm;base64,!!!not-base64!!!").is_err());
    }

    #[test]
    fn provider_selection() {
        assert!(blob_store_for("inline").is_ok());
        assert!(blob_store_for("s3").is_err());
    }
}

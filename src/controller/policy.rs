//! Fetch resolution policy: write-back mode and the offline document fallback

use serde::{Deserialize, Serialize};

use crate::cache::RequestKey;
use crate::constants::{DEFAULT_FALLBACK_DOCUMENT, DEFAULT_FALLBACK_SUFFIXES};

/// How a network response is written back into the current bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteBackMode {
    /// Spawn the write and return the response immediately
    #[default]
    Detached,
    /// Wait for the write before returning the response
    Awaited,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Cached document served when a document request fails offline
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// Path suffixes that mark a request as a document request
    #[serde(default = "default_fallback_suffixes")]
    pub fallback_suffixes: Vec<String>,

    #[serde(default)]
    pub write_back: WriteBackMode,

    /// Treat 5xx responses to document requests like network failures
    #[serde(default)]
    pub fallback_on_error_status: bool,
}

fn default_fallback_document() -> String {
    DEFAULT_FALLBACK_DOCUMENT.to_string()
}

fn default_fallback_suffixes() -> Vec<String> {
    DEFAULT_FALLBACK_SUFFIXES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            fallback_document: default_fallback_document(),
            fallback_suffixes: default_fallback_suffixes(),
            write_back: WriteBackMode::default(),
            fallback_on_error_status: false,
        }
    }
}

impl FetchPolicy {
    /// Whether the request qualifies for the fallback document
    pub fn is_document_request(&self, request: &RequestKey) -> bool {
        let path = request.path();
        self.fallback_suffixes
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()))
    }

    /// Cache key of the fallback document
    pub fn fallback_key(&self) -> RequestKey {
        RequestKey::get(&self.fallback_document)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fallback_document.trim().is_empty() {
            return Err("fallback_document cannot be empty".to_string());
        }
        if self.fallback_suffixes.iter().any(|s| s.is_empty()) {
            return Err("fallback_suffixes cannot contain an empty suffix".to_string());
        }
        Ok(())
    }
}

//! Asset manifest: the ordered list of resources every installed bucket must hold

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::ManifestError;
use crate::cache::RequestKey;
use crate::constants::DEFAULT_MANIFEST;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AssetManifest {
    entries: Vec<String>,
}

impl AssetManifest {
    /// Build a manifest, rejecting empty entries and entries that resolve to
    /// the same request (a batch with duplicate requests is invalid)
    pub fn new<I, S>(entries: I) -> Result<Self, ManifestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.trim().is_empty() {
                return Err(ManifestError::EmptyEntry { index });
            }
            if !seen.insert(RequestKey::get(entry)) {
                return Err(ManifestError::Duplicate(entry.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The manifest compiled into the binary
    pub fn builtin() -> Self {
        Self {
            entries: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Request keys the install phase fetches, in manifest order
    pub fn request_keys(&self) -> Vec<RequestKey> {
        self.entries.iter().map(|e| RequestKey::get(e)).collect()
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TryFrom<Vec<String>> for AssetManifest {
    type Error = ManifestError;

    fn try_from(entries: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<AssetManifest> for Vec<String> {
    fn from(manifest: AssetManifest) -> Self {
        manifest.entries
    }
}

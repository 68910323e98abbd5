//! Error types for the offline cache controller
//!
//! - `InstallError`: the install batch failed as a whole
//! - `ActivateError`: activation could not start or open its bucket
//! - `BucketDeletionError`: one stale bucket survived the sweep (non-fatal)
//! - `ResolutionError`: a request could be served neither from cache nor network

use serde::Serialize;
use thiserror::Error;

use super::LifecycleState;
use crate::cache::{CacheError, CacheVersion};
use crate::network::NetworkError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("Manifest entry {index} is empty")]
    EmptyEntry { index: usize },

    #[error("Manifest entry '{0}' is listed more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Cannot {event} while the controller is {state}")]
    PhaseInProgress {
        event: &'static str,
        state: LifecycleState,
    },

    #[error("Cannot activate {version}: controller is {state}")]
    NotInstalled {
        version: CacheVersion,
        state: LifecycleState,
    },

    #[error("Version {0} is already active")]
    AlreadyActive(CacheVersion),

    #[error("No installed bucket for version {0}")]
    UnknownVersion(CacheVersion),
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Failed to open bucket {version}: {source}")]
    OpenBucket {
        version: CacheVersion,
        source: CacheError,
    },

    #[error("Failed to fetch manifest entry {path}: {reason}")]
    ManifestFetch { path: String, reason: String },

    #[error("Failed to store manifest entry {path}: {source}")]
    Store { path: String, source: CacheError },
}

#[derive(Debug, Error)]
pub enum ActivateError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Storage error while activating {version}: {source}")]
    Storage {
        version: CacheVersion,
        source: CacheError,
    },
}

/// A stale bucket that could not be deleted during activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("Failed to delete stale bucket {version}: {reason}")]
pub struct BucketDeletionError {
    pub version: CacheVersion,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("No active cache bucket; the controller has not been activated")]
    Inactive,

    #[error("Network request for {request} failed: {source}")]
    Network {
        request: String,
        source: NetworkError,
    },

    #[error("Network request for {request} failed and fallback document {fallback} is not cached: {source}")]
    NoFallback {
        request: String,
        fallback: String,
        source: NetworkError,
    },
}

// Error types module

use std::fmt;

use crate::cache::CacheError;
use crate::controller::{ActivateError, InstallError, ResolutionError};
use crate::network::NetworkError;
use crate::records::RecordError;

/// Centralized error type for the crate
///
/// Groups the per-module errors by the subsystem that raised them, so hosts
/// can report or map them without matching every variant.
#[derive(Debug)]
pub enum KuraError {
    /// Configuration errors (invalid YAML, missing env vars, failed validation)
    Config(String),

    /// Cache storage errors outside of a lifecycle phase
    Cache(CacheError),

    /// Network facility construction errors
    Network(NetworkError),

    /// Install or activate phase failures
    Lifecycle(String),

    /// A request could not be resolved
    Resolution(ResolutionError),

    /// Record store errors
    Records(RecordError),

    /// Unexpected internal errors
    Internal(String),
}

impl fmt::Display for KuraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KuraError::Config(msg) => write!(f, "Configuration error: {}", msg),
            KuraError::Cache(err) => write!(f, "Cache error: {}", err),
            KuraError::Network(err) => write!(f, "Network error: {}", err),
            KuraError::Lifecycle(msg) => write!(f, "Lifecycle error: {}", msg),
            KuraError::Resolution(err) => write!(f, "Resolution error: {}", err),
            KuraError::Records(err) => write!(f, "Record store error: {}", err),
            KuraError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for KuraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KuraError::Cache(err) => Some(err),
            KuraError::Network(err) => Some(err),
            KuraError::Resolution(err) => Some(err),
            KuraError::Records(err) => Some(err),
            KuraError::Config(_) | KuraError::Lifecycle(_) | KuraError::Internal(_) => None,
        }
    }
}

impl From<CacheError> for KuraError {
    fn from(err: CacheError) -> Self {
        KuraError::Cache(err)
    }
}

impl From<NetworkError> for KuraError {
    fn from(err: NetworkError) -> Self {
        KuraError::Network(err)
    }
}

impl From<InstallError> for KuraError {
    fn from(err: InstallError) -> Self {
        KuraError::Lifecycle(err.to_string())
    }
}

impl From<ActivateError> for KuraError {
    fn from(err: ActivateError) -> Self {
        KuraError::Lifecycle(err.to_string())
    }
}

impl From<ResolutionError> for KuraError {
    fn from(err: ResolutionError) -> Self {
        KuraError::Resolution(err)
    }
}

impl From<RecordError> for KuraError {
    fn from(err: RecordError) -> Self {
        KuraError::Records(err)
    }
}

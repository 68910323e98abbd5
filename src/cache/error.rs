//! Cache error types
//!
//! This module defines error types for cache storage operations.

/// Cache error types
#[derive(Debug)]
pub enum CacheError {
    /// No bucket exists for the requested version
    BucketNotFound(String),
    /// I/O error (for disk storage)
    IoError(std::io::Error),
    /// Serialization/deserialization error
    SerializationError(String),
    /// Malformed request key or bucket version
    InvalidKey(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::BucketNotFound(version) => write!(f, "Cache bucket not found: {}", version),
            CacheError::IoError(err) => write!(f, "I/O error: {}", err),
            CacheError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            CacheError::InvalidKey(msg) => write!(f, "Invalid cache key: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::IoError(err)
    }
}

impl From<rmp_serde::encode::Error> for CacheError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        CacheError::SerializationError(format!("MessagePack encoding failed: {}", err))
    }
}

impl From<rmp_serde::decode::Error> for CacheError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CacheError::SerializationError(format!("MessagePack decoding failed: {}", err))
    }
}

//! Cache storage trait definitions
//!
//! `CacheStorage` manages versioned buckets; `Bucket` stores request/response
//! entries for a single version. Memory and disk storages implement both.

use async_trait::async_trait;
use std::sync::Arc;

use super::entry::{CacheVersion, RequestKey, ResponseSnapshot};
use super::error::CacheError;

/// A single versioned bucket of cached responses
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Version this bucket belongs to
    fn version(&self) -> &CacheVersion;

    /// Store a snapshot under a request key
    /// Overwrites an existing entry (last write wins)
    async fn put(&self, key: RequestKey, snapshot: ResponseSnapshot) -> Result<(), CacheError>;

    /// Look up a snapshot by request key
    async fn match_request(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, CacheError>;

    /// Delete an entry
    /// Returns true if the entry existed
    async fn delete(&self, key: &RequestKey) -> Result<bool, CacheError>;

    /// All request keys stored in this bucket
    async fn keys(&self) -> Result<Vec<RequestKey>, CacheError>;
}

/// Storage facility holding every bucket version
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the bucket for a version, creating it if absent
    async fn open_bucket(&self, version: &CacheVersion) -> Result<Arc<dyn Bucket>, CacheError>;

    /// Whether a bucket exists for the version
    async fn has_bucket(&self, version: &CacheVersion) -> Result<bool, CacheError>;

    /// Versions of every existing bucket, sorted
    async fn list_versions(&self) -> Result<Vec<CacheVersion>, CacheError>;

    /// Delete a bucket and all its entries
    /// Returns true if the bucket existed
    async fn delete_bucket(&self, version: &CacheVersion) -> Result<bool, CacheError>;
}

//! Memory storage implementation
//!
//! This module provides in-memory cache storage:
//! - `MemoryStorage`: Map of bucket versions, guarded by a `parking_lot` lock
//! - `MemoryBucket`: Unbounded moka cache holding the entries of one version

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::entry::{CacheVersion, RequestKey, ResponseSnapshot};
use super::error::CacheError;
use super::traits::{Bucket, CacheStorage};

/// MemoryBucket wraps moka for our Bucket trait
///
/// No capacity or TTL is configured: manifest entries must stay put until the
/// whole bucket is deleted.
pub struct MemoryBucket {
    version: CacheVersion,
    entries: moka::future::Cache<RequestKey, ResponseSnapshot>,
}

impl MemoryBucket {
    pub fn new(version: CacheVersion) -> Self {
        Self {
            version,
            entries: moka::future::Cache::builder().build(),
        }
    }

    /// Get current entry count (approximate due to eventual consistency)
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Forces moka to process pending maintenance so counts are exact
    pub async fn run_pending(&self) {
        self.entries.run_pending_tasks().await;
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn version(&self) -> &CacheVersion {
        &self.version
    }

    async fn put(&self, key: RequestKey, snapshot: ResponseSnapshot) -> Result<(), CacheError> {
        self.entries.insert(key, snapshot).await;
        Ok(())
    }

    async fn match_request(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, CacheError> {
        Ok(self.entries.get(key).await)
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, CacheError> {
        // moka's iter() returns Arc<K>, so we need to dereference
        Ok(self.entries.iter().map(|(k, _)| (*k).clone()).collect())
    }
}

/// In-memory storage for all bucket versions
#[derive(Default)]
pub struct MemoryStorage {
    buckets: RwLock<BTreeMap<CacheVersion, Arc<MemoryBucket>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open_bucket(&self, version: &CacheVersion) -> Result<Arc<dyn Bucket>, CacheError> {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .entry(version.clone())
            .or_insert_with(|| Arc::new(MemoryBucket::new(version.clone())))
            .clone();
        Ok(bucket)
    }

    async fn has_bucket(&self, version: &CacheVersion) -> Result<bool, CacheError> {
        Ok(self.buckets.read().contains_key(version))
    }

    async fn list_versions(&self) -> Result<Vec<CacheVersion>, CacheError> {
        Ok(self.buckets.read().keys().cloned().collect())
    }

    async fn delete_bucket(&self, version: &CacheVersion) -> Result<bool, CacheError> {
        let removed = self.buckets.write().remove(version);
        match removed {
            Some(bucket) => {
                bucket.entries.invalidate_all();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

//! Disk-based cache storage
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<url-encoded version>/<sha256(request key)>.entry
//! ```
//!
//! Each entry file is a MessagePack record holding a format marker, the
//! request key and the response snapshot. Writes go through a temp file and
//! an atomic rename so a reader never observes a torn entry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::entry::{CacheVersion, RequestKey, ResponseSnapshot};
use super::error::CacheError;
use super::traits::{Bucket, CacheStorage};

/// Serialization format version for schema evolution
const ENTRY_FORMAT_VERSION: u8 = 1;

const ENTRY_EXTENSION: &str = "entry";

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    format: u8,
    key: &'a RequestKey,
    snapshot: &'a ResponseSnapshot,
}

#[derive(Deserialize)]
struct StoredEntry {
    format: u8,
    key: RequestKey,
    snapshot: ResponseSnapshot,
}

/// Convert a RequestKey to a SHA256 hash for use as a filename
pub fn key_to_hash(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_bytes());
    hasher.update(b"\0");
    hasher.update(key.url.as_bytes());
    for (name, value) in &key.headers {
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn encode_entry(key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<Vec<u8>, CacheError> {
    let stored = StoredEntryRef {
        format: ENTRY_FORMAT_VERSION,
        key,
        snapshot,
    };
    Ok(rmp_serde::to_vec_named(&stored)?)
}

fn decode_entry(bytes: &[u8]) -> Result<StoredEntry, CacheError> {
    let stored: StoredEntry = rmp_serde::from_slice(bytes)?;
    if stored.format != ENTRY_FORMAT_VERSION {
        return Err(CacheError::SerializationError(format!(
            "unsupported entry format {}",
            stored.format
        )));
    }
    Ok(stored)
}

/// Bucket stored as one directory of entry files
pub struct DiskBucket {
    version: CacheVersion,
    dir: PathBuf,
}

impl DiskBucket {
    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", key_to_hash(key), ENTRY_EXTENSION))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Bucket for DiskBucket {
    fn version(&self) -> &CacheVersion {
        &self.version
    }

    async fn put(&self, key: RequestKey, snapshot: ResponseSnapshot) -> Result<(), CacheError> {
        let data = encode_entry(&key, &snapshot)?;
        let path = self.entry_path(&key);

        // The directory is created by open_bucket only; writes into a deleted
        // bucket fail instead of resurrecting it.
        // Unique temp name: concurrent writers of the same key must not share it
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        match tokio::fs::write(&temp_path, &data).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::BucketNotFound(self.version.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn match_request(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, CacheError> {
        let data = match tokio::fs::read(self.entry_path(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored = decode_entry(&data)?;
        if stored.key != *key {
            return Ok(None);
        }
        Ok(Some(stored.snapshot))
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, CacheError> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, CacheError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let data = tokio::fs::read(&path).await?;
            keys.push(decode_entry(&data)?.key);
        }
        Ok(keys)
    }
}

/// Disk storage rooted at a directory, one subdirectory per bucket version
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage root if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let storage = Self::new(root);
        tokio::fs::create_dir_all(&storage.root).await?;
        Ok(storage)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, version: &CacheVersion) -> Result<PathBuf, CacheError> {
        let name = urlencoding::encode(version.as_str());
        if name == "." || name == ".." {
            return Err(CacheError::InvalidKey(format!(
                "bucket version '{}' is not a valid directory name",
                version
            )));
        }
        Ok(self.root.join(name.as_ref()))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open_bucket(&self, version: &CacheVersion) -> Result<Arc<dyn Bucket>, CacheError> {
        let dir = self.bucket_dir(version)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Arc::new(DiskBucket {
            version: version.clone(),
            dir,
        }))
    }

    async fn has_bucket(&self, version: &CacheVersion) -> Result<bool, CacheError> {
        match tokio::fs::metadata(self.bucket_dir(version)?).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_versions(&self) -> Result<Vec<CacheVersion>, CacheError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 bucket directory");
                continue;
            };
            match urlencoding::decode(name)
                .map_err(|e| CacheError::InvalidKey(e.to_string()))
                .and_then(|decoded| CacheVersion::new(decoded.into_owned()))
            {
                Ok(version) => versions.push(version),
                Err(e) => {
                    tracing::warn!(directory = name, error = %e, "Skipping unrecognised bucket directory");
                }
            }
        }
        versions.sort();
        Ok(versions)
    }

    async fn delete_bucket(&self, version: &CacheVersion) -> Result<bool, CacheError> {
        match tokio::fs::remove_dir_all(self.bucket_dir(version)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

// Configuration module
//
// Every section has compiled-in defaults, so an empty YAML document is a
// complete configuration: the shipped manifest, version and fetch policy.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheError, CacheStorage, CacheVersion, DiskStorage, MemoryStorage};
use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_CACHE_GENERATION, DEFAULT_CACHE_NAME, DEFAULT_NETWORK_TIMEOUT_SECS,
    DEFAULT_ORIGIN, DEFAULT_RECORDS_PATH,
};
use crate::controller::{AssetManifest, FetchPolicy};
use crate::network::{HttpNetwork, NetworkError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub manifest: AssetManifest,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub fetch: FetchPolicy,
    #[serde(default)]
    pub records: RecordsConfig,
}

/// Cache naming and storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Cache name; the bucket version is `<name>-v<generation>`
    #[serde(default = "default_cache_name")]
    pub name: String,
    /// Bump to roll out a new bucket and sweep the old ones
    #[serde(default = "default_cache_generation")]
    pub generation: u64,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            name: default_cache_name(),
            generation: default_cache_generation(),
            storage: StorageConfig::default(),
        }
    }
}

fn default_cache_name() -> String {
    DEFAULT_CACHE_NAME.to_string()
}

fn default_cache_generation() -> u64 {
    DEFAULT_CACHE_GENERATION
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    Disk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Origin that relative request paths resolve against
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_NETWORK_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// JSON file backing the record store; `null` keeps records in memory
    #[serde(default = "default_records_path")]
    pub path: Option<String>,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            path: default_records_path(),
        }
    }
}

fn default_records_path() -> Option<String> {
    Some(DEFAULT_RECORDS_PATH.to_string())
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        // An empty document deserializes to unit, not an empty map
        if substituted.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache.name.trim().is_empty() {
            return Err("Cache name cannot be empty".to_string());
        }

        if self.cache.generation == 0 {
            return Err("Cache generation must be greater than 0".to_string());
        }

        if self.cache.storage.backend == StorageBackend::Disk && self.cache.storage.dir.is_empty() {
            return Err("storage dir cannot be empty when the disk backend is selected".to_string());
        }

        // Serde already enforces this; configs built in code bypass serde
        AssetManifest::new(self.manifest.iter()).map_err(|e| e.to_string())?;

        reqwest::Url::parse(&self.network.origin)
            .map_err(|e| format!("Invalid network origin '{}': {}", self.network.origin, e))?;

        if self.network.timeout_seconds == 0 {
            return Err("Network timeout must be greater than 0".to_string());
        }

        self.fetch.validate()?;

        if let Some(path) = &self.records.path {
            if path.is_empty() {
                return Err("records path cannot be empty; use null for an in-memory store".to_string());
            }
        }

        Ok(())
    }

    /// Commands that run after `install` in a later process need buckets that
    /// outlive it; the memory backend starts empty every time
    pub fn require_persistent_storage(&self, command: &str) -> Result<(), String> {
        if self.cache.storage.backend == StorageBackend::Memory {
            return Err(format!(
                "'{}' needs the disk storage backend; memory buckets do not survive between runs",
                command
            ));
        }
        Ok(())
    }

    /// Version of the bucket this configuration installs
    pub fn cache_version(&self) -> CacheVersion {
        CacheVersion::from_generation(&self.cache.name, self.cache.generation)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_seconds)
    }

    pub fn records_path(&self) -> Option<PathBuf> {
        self.records.path.as_ref().map(PathBuf::from)
    }

    pub async fn build_storage(&self) -> Result<Arc<dyn CacheStorage>, CacheError> {
        match self.cache.storage.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
            StorageBackend::Disk => Ok(Arc::new(
                DiskStorage::open(&self.cache.storage.dir).await?,
            )),
        }
    }

    pub fn build_network(&self) -> Result<HttpNetwork, NetworkError> {
        HttpNetwork::new(&self.network.origin, self.network_timeout())
    }
}

//! Offline cache controller
//!
//! Drives the install -> activate lifecycle of versioned cache buckets and
//! resolves intercepted requests cache-first:
//!
//! 1. **install**: fetch every manifest entry, then store the whole batch in
//!    the bucket for the new version. Any failure fails the install.
//! 2. **activate**: delete every other bucket version (best effort,
//!    concurrently) and make the new bucket current.
//! 3. **fetch**: serve from the current bucket; on a miss go to the network
//!    and write the response back; if the network fails, serve the cached
//!    fallback document for document requests.
//!
//! Both phases are eager: install requests to skip waiting for older
//! instances and activation claims open clients immediately.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::cache::{
    Bucket, CacheError, CacheStorage, CacheVersion, FetchStats, FetchStatsTracker, RequestKey,
    ResponseSnapshot,
};
use crate::network::{Network, NetworkError};

pub mod error;
pub mod manifest;
pub mod policy;

pub use error::{
    ActivateError, BucketDeletionError, InstallError, LifecycleError, ManifestError,
    ResolutionError,
};
pub use manifest::AssetManifest;
pub use policy::{FetchPolicy, WriteBackMode};

/// Lifecycle state of the controller's newest version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "version", rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing(CacheVersion),
    Installed(CacheVersion),
    Activating(CacheVersion),
    Activated(CacheVersion),
    /// Install failed; the version must not be treated as installed
    Redundant(CacheVersion),
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Parsed => write!(f, "parsed"),
            LifecycleState::Installing(v) => write!(f, "installing {}", v),
            LifecycleState::Installed(v) => write!(f, "installed {}", v),
            LifecycleState::Activating(v) => write!(f, "activating {}", v),
            LifecycleState::Activated(v) => write!(f, "activated {}", v),
            LifecycleState::Redundant(v) => write!(f, "redundant {}", v),
        }
    }
}

/// Outcome of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub id: Uuid,
    pub version: CacheVersion,
    pub entries_cached: usize,
    pub bytes_cached: u64,
    pub elapsed_ms: u64,
}

/// Outcome of an activation sweep
#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub version: CacheVersion,
    pub deleted: Vec<CacheVersion>,
    pub failed: Vec<BucketDeletionError>,
}

pub struct OfflineCacheController {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    policy: FetchPolicy,
    origin: Option<String>,
    state: Mutex<LifecycleState>,
    current: RwLock<Option<Arc<dyn Bucket>>>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
    stats: Arc<FetchStatsTracker>,
    write_backs: Mutex<JoinSet<()>>,
}

impl OfflineCacheController {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            storage,
            network,
            policy,
            origin: None,
            state: Mutex::new(LifecycleState::Parsed),
            current: RwLock::new(None),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
            stats: Arc::new(FetchStatsTracker::new()),
            write_backs: Mutex::new(JoinSet::new()),
        }
    }

    /// Create an already-activated controller over a bucket installed earlier
    /// (for example by a previous process)
    pub async fn resume(
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        policy: FetchPolicy,
        version: &CacheVersion,
    ) -> Result<Self, ActivateError> {
        let exists = storage
            .has_bucket(version)
            .await
            .map_err(|source| ActivateError::Storage {
                version: version.clone(),
                source,
            })?;
        if !exists {
            return Err(LifecycleError::UnknownVersion(version.clone()).into());
        }

        let bucket = storage
            .open_bucket(version)
            .await
            .map_err(|source| ActivateError::Storage {
                version: version.clone(),
                source,
            })?;

        let controller = Self::new(storage, network, policy);
        *controller.current.write() = Some(bucket);
        *controller.state.lock() = LifecycleState::Activated(version.clone());
        controller.clients_claimed.store(true, Ordering::SeqCst);
        tracing::info!(version = %version, "Resumed offline cache controller");
        Ok(controller)
    }

    /// Treat absolute URLs on `origin` as the same requests as their
    /// origin-relative paths
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    fn scoped(&self, request: &RequestKey) -> RequestKey {
        match &self.origin {
            Some(origin) => request.relative_to(origin),
            None => request.clone(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.lock().clone()
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Version of the bucket currently serving requests
    pub fn current_version(&self) -> Option<CacheVersion> {
        self.current.read().as_ref().map(|b| b.version().clone())
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> FetchStats {
        self.stats.snapshot()
    }

    // =========================================================================
    // Install
    // =========================================================================

    /// Install `version`: fetch the whole manifest, then store it as one batch
    ///
    /// Entries written before a store failure are left in the bucket; a later
    /// install of the same version overwrites them.
    pub async fn on_install(
        &self,
        manifest: &AssetManifest,
        version: &CacheVersion,
    ) -> Result<InstallReport, InstallError> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            if matches!(
                *state,
                LifecycleState::Installing(_) | LifecycleState::Activating(_)
            ) {
                return Err(LifecycleError::PhaseInProgress {
                    event: "install",
                    state: state.clone(),
                }
                .into());
            }
            if *state == LifecycleState::Activated(version.clone()) {
                return Err(LifecycleError::AlreadyActive(version.clone()).into());
            }
            *state = LifecycleState::Installing(version.clone());
        }

        tracing::info!(version = %version, entries = manifest.len(), "Installing cache bucket");
        let started = Instant::now();
        let result = self.populate(manifest, version).await;

        let mut state = self.state.lock();
        match result {
            Ok((entries_cached, bytes_cached)) => {
                *state = LifecycleState::Installed(version.clone());
                let report = InstallReport {
                    id: Uuid::new_v4(),
                    version: version.clone(),
                    entries_cached,
                    bytes_cached,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                };
                tracing::info!(
                    version = %version,
                    entries = report.entries_cached,
                    bytes = report.bytes_cached,
                    elapsed_ms = report.elapsed_ms,
                    "Cache bucket installed"
                );
                Ok(report)
            }
            Err(e) => {
                *state = LifecycleState::Redundant(version.clone());
                tracing::error!(version = %version, error = %e, "Cache bucket install failed");
                Err(e)
            }
        }
    }

    async fn populate(
        &self,
        manifest: &AssetManifest,
        version: &CacheVersion,
    ) -> Result<(usize, u64), InstallError> {
        let bucket =
            self.storage
                .open_bucket(version)
                .await
                .map_err(|source| InstallError::OpenBucket {
                    version: version.clone(),
                    source,
                })?;

        let fetches = manifest.iter().map(|path| async move {
            let key = self.scoped(&RequestKey::get(path));
            match self.network.fetch(&key).await {
                Ok(response) if response.is_success() => Ok((key, response)),
                Ok(response) => Err(InstallError::ManifestFetch {
                    path: path.to_string(),
                    reason: format!("unexpected status {}", response.status),
                }),
                Err(e) => Err(InstallError::ManifestFetch {
                    path: path.to_string(),
                    reason: e.to_string(),
                }),
            }
        });
        let responses = futures::future::try_join_all(fetches).await?;

        let entries = responses.len();
        let bytes: u64 = responses.iter().map(|(_, r)| r.body.len() as u64).sum();

        let stores = responses.into_iter().map(|(key, response)| {
            let bucket = bucket.clone();
            async move {
                let path = key.url.clone();
                bucket
                    .put(key, response)
                    .await
                    .map_err(|source| InstallError::Store { path, source })
            }
        });
        futures::future::try_join_all(stores).await?;

        Ok((entries, bytes))
    }

    // =========================================================================
    // Activate
    // =========================================================================

    /// Activate an installed version and sweep every other bucket
    ///
    /// Deletion failures are logged and reported; they never fail activation.
    pub async fn on_activate(&self, version: &CacheVersion) -> Result<ActivateReport, ActivateError> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Installed(version.clone()) {
                return Err(LifecycleError::NotInstalled {
                    version: version.clone(),
                    state: state.clone(),
                }
                .into());
            }
            *state = LifecycleState::Activating(version.clone());
        }

        tracing::info!(version = %version, "Activating cache bucket");
        match self.sweep(version).await {
            Ok((bucket, report)) => {
                *self.current.write() = Some(bucket);
                *self.state.lock() = LifecycleState::Activated(version.clone());
                self.clients_claimed.store(true, Ordering::SeqCst);
                tracing::info!(
                    version = %version,
                    deleted = report.deleted.len(),
                    failed = report.failed.len(),
                    "Cache bucket activated"
                );
                Ok(report)
            }
            Err(e) => {
                // Still installed; the host may retry activation
                *self.state.lock() = LifecycleState::Installed(version.clone());
                Err(e)
            }
        }
    }

    async fn sweep(
        &self,
        version: &CacheVersion,
    ) -> Result<(Arc<dyn Bucket>, ActivateReport), ActivateError> {
        let storage_error = |source: CacheError| ActivateError::Storage {
            version: version.clone(),
            source,
        };

        let bucket = self
            .storage
            .open_bucket(version)
            .await
            .map_err(storage_error)?;
        let versions = self.storage.list_versions().await.map_err(storage_error)?;

        let deletions = versions
            .into_iter()
            .filter(|v| v != version)
            .map(|stale| async move {
                let outcome = self.storage.delete_bucket(&stale).await;
                (stale, outcome)
            });
        let outcomes = futures::future::join_all(deletions).await;

        let mut report = ActivateReport {
            version: version.clone(),
            deleted: Vec::new(),
            failed: Vec::new(),
        };
        for (stale, outcome) in outcomes {
            match outcome {
                Ok(_) => {
                    tracing::info!(version = %stale, "Cleared stale cache bucket");
                    report.deleted.push(stale);
                }
                Err(e) => {
                    let err = BucketDeletionError {
                        version: stale,
                        reason: e.to_string(),
                    };
                    tracing::warn!(error = %err, "Stale cache bucket deletion failed");
                    report.failed.push(err);
                }
            }
        }

        Ok((bucket, report))
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Resolve one intercepted request: cache, then network, then fallback
    pub async fn on_fetch(&self, request: &RequestKey) -> Result<ResponseSnapshot, ResolutionError> {
        let request = &self.scoped(request);
        let bucket = self
            .current
            .read()
            .clone()
            .ok_or(ResolutionError::Inactive)?;

        // Only GET requests can be cache keys
        if !request.is_get() {
            return self.fetch_from_network(request).await.map_err(|source| {
                ResolutionError::Network {
                    request: request.to_string(),
                    source,
                }
            });
        }

        match bucket.match_request(request).await {
            Ok(Some(snapshot)) => {
                self.stats.record_hit();
                tracing::debug!(request = %request, "Serving cached response");
                return Ok(snapshot);
            }
            Ok(None) => self.stats.record_miss(),
            Err(e) => {
                self.stats.record_miss();
                tracing::warn!(request = %request, error = %e, "Cache lookup failed, treating as miss");
            }
        }

        match self.fetch_from_network(request).await {
            Ok(response) => {
                if self.policy.fallback_on_error_status
                    && response.is_server_error()
                    && self.policy.is_document_request(request)
                {
                    if let Some(fallback) = self.lookup_fallback(bucket.as_ref()).await {
                        tracing::info!(request = %request, status = response.status, "Serving fallback document for error response");
                        return Ok(fallback);
                    }
                    return Ok(response);
                }

                self.write_back(bucket, request.clone(), response.clone())
                    .await;
                Ok(response)
            }
            Err(source) => {
                if !self.policy.is_document_request(request) {
                    return Err(ResolutionError::Network {
                        request: request.to_string(),
                        source,
                    });
                }
                match self.lookup_fallback(bucket.as_ref()).await {
                    Some(fallback) => {
                        tracing::info!(request = %request, error = %source, "Serving fallback document while offline");
                        Ok(fallback)
                    }
                    None => Err(ResolutionError::NoFallback {
                        request: request.to_string(),
                        fallback: self.policy.fallback_document.clone(),
                        source,
                    }),
                }
            }
        }
    }

    async fn fetch_from_network(&self, request: &RequestKey) -> Result<ResponseSnapshot, NetworkError> {
        self.stats.record_network_fetch();
        tracing::debug!(request = %request, "Fetching from network");
        self.network.fetch(request).await.map_err(|e| {
            self.stats.record_network_failure();
            tracing::warn!(request = %request, error = %e, "Network fetch failed");
            e
        })
    }

    async fn lookup_fallback(&self, bucket: &dyn Bucket) -> Option<ResponseSnapshot> {
        match bucket.match_request(&self.policy.fallback_key()).await {
            Ok(Some(snapshot)) => {
                self.stats.record_fallback();
                Some(snapshot)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Fallback document lookup failed");
                None
            }
        }
    }

    async fn write_back(&self, bucket: Arc<dyn Bucket>, key: RequestKey, snapshot: ResponseSnapshot) {
        match self.policy.write_back {
            WriteBackMode::Awaited => {
                let result = bucket.put(key.clone(), snapshot).await;
                finish_write_back(&self.stats, bucket.version(), &key, result);
            }
            WriteBackMode::Detached => {
                let stats = self.stats.clone();
                let mut tasks = self.write_backs.lock();
                // Reap finished writes so the set does not grow unbounded
                while tasks.try_join_next().is_some() {}
                tasks.spawn(async move {
                    let result = bucket.put(key.clone(), snapshot).await;
                    finish_write_back(&stats, bucket.version(), &key, result);
                });
            }
        }
    }

    /// Wait for every detached write-back spawned so far
    pub async fn settle_write_backs(&self) {
        let mut pending = std::mem::take(&mut *self.write_backs.lock());
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Write-back task did not complete");
            }
        }
    }
}

fn finish_write_back(
    stats: &FetchStatsTracker,
    version: &CacheVersion,
    key: &RequestKey,
    result: Result<(), CacheError>,
) {
    match result {
        Ok(()) => {
            stats.record_write_back(true);
            tracing::debug!(version = %version, request = %key, "Cached network response");
        }
        Err(e) => {
            stats.record_write_back(false);
            tracing::warn!(version = %version, request = %key, error = %e, "Write-back failed");
        }
    }
}

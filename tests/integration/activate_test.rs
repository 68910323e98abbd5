// Activate phase: stale buckets are swept, failures to delete are reported
// but never block activation.

use std::sync::Arc;

use kura::cache::{CacheStorage, CacheVersion, MemoryStorage, ResponseSnapshot, RequestKey};
use kura::controller::{
    AssetManifest, FetchPolicy, LifecycleError, ActivateError, LifecycleState,
    OfflineCacheController,
};

use super::test_harness::{version, FlakyStorage, ScriptedNetwork};

async fn seed_bucket(storage: &dyn CacheStorage, version: &CacheVersion) {
    let bucket = storage.open_bucket(version).await.unwrap();
    bucket
        .put(RequestKey::get("/index.html"), ResponseSnapshot::new(200, "stale"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_activation_sweeps_all_stale_buckets() {
    let manifest = AssetManifest::builtin();
    let storage = Arc::new(MemoryStorage::new());
    for generation in 1..=3 {
        seed_bucket(storage.as_ref(), &version(generation)).await;
    }
    let unrelated = CacheVersion::new("some-other-cache").unwrap();
    seed_bucket(storage.as_ref(), &unrelated).await;

    let network = Arc::new(ScriptedNetwork::serving(&manifest, 4));
    let controller = OfflineCacheController::new(storage.clone(), network, FetchPolicy::default());
    controller.on_install(&manifest, &version(4)).await.unwrap();

    let report = controller.on_activate(&version(4)).await.unwrap();

    assert_eq!(report.deleted.len(), 4);
    assert!(report.deleted.contains(&unrelated));
    assert!(report.failed.is_empty());
    assert_eq!(storage.list_versions().await.unwrap(), vec![version(4)]);
    assert_eq!(controller.state(), LifecycleState::Activated(version(4)));
    assert_eq!(controller.current_version(), Some(version(4)));
    assert!(controller.clients_claimed());
}

#[tokio::test]
async fn test_deletion_failure_does_not_block_activation() {
    let manifest = AssetManifest::new(["/", "/index.html"]).unwrap();
    let storage = Arc::new(FlakyStorage::new());
    seed_bucket(storage.as_ref(), &version(1)).await;
    seed_bucket(storage.as_ref(), &version(2)).await;
    storage.refuse_delete(version(1));

    let network = Arc::new(ScriptedNetwork::serving(&manifest, 3));
    let controller = OfflineCacheController::new(storage.clone(), network, FetchPolicy::default());
    controller.on_install(&manifest, &version(3)).await.unwrap();

    let report = controller.on_activate(&version(3)).await.unwrap();

    assert_eq!(report.deleted, vec![version(2)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].version, version(1));
    assert!(report.failed[0].reason.contains("locked"));

    // The surviving stale bucket is still there; the new one serves requests
    assert_eq!(
        storage.list_versions().await.unwrap(),
        vec![version(1), version(3)]
    );
    assert_eq!(controller.state(), LifecycleState::Activated(version(3)));
}

#[tokio::test]
async fn test_activation_with_no_stale_buckets() {
    let manifest = AssetManifest::new(["/index.html"]).unwrap();
    let network = Arc::new(ScriptedNetwork::serving(&manifest, 1));
    let controller = OfflineCacheController::new(
        Arc::new(MemoryStorage::new()),
        network,
        FetchPolicy::default(),
    );
    controller.on_install(&manifest, &version(1)).await.unwrap();

    let report = controller.on_activate(&version(1)).await.unwrap();
    assert!(report.deleted.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_activation_requires_matching_installed_version() {
    let manifest = AssetManifest::new(["/index.html"]).unwrap();
    let network = Arc::new(ScriptedNetwork::serving(&manifest, 1));
    let controller = OfflineCacheController::new(
        Arc::new(MemoryStorage::new()),
        network,
        FetchPolicy::default(),
    );

    let err = controller.on_activate(&version(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ActivateError::Lifecycle(LifecycleError::NotInstalled { .. })
    ));

    controller.on_install(&manifest, &version(1)).await.unwrap();
    assert!(controller.on_activate(&version(2)).await.is_err());
    assert_eq!(controller.state(), LifecycleState::Installed(version(1)));
}

// Install phase: the whole manifest is stored as one batch, or the version
// is never considered installed.

use std::sync::Arc;

use kura::cache::{CacheStorage, MemoryStorage, RequestKey, ResponseSnapshot};
use kura::controller::{
    AssetManifest, FetchPolicy, InstallError, LifecycleState, OfflineCacheController,
};

use super::test_harness::{asset_body, version, ScriptedNetwork};

#[tokio::test]
async fn test_install_stores_every_manifest_entry_byte_for_byte() {
    let manifest = AssetManifest::builtin();
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(ScriptedNetwork::serving(&manifest, 1));
    let controller =
        OfflineCacheController::new(storage.clone(), network.clone(), FetchPolicy::default());

    let report = controller.on_install(&manifest, &version(1)).await.unwrap();

    assert_eq!(report.entries_cached, manifest.len());
    assert_eq!(controller.state(), LifecycleState::Installed(version(1)));
    assert!(controller.skip_waiting_requested());

    let bucket = storage.open_bucket(&version(1)).await.unwrap();
    for key in manifest.request_keys() {
        let cached = bucket
            .match_request(&key)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("{} was not cached", key));
        assert_eq!(cached.body, asset_body(&key.url, 1).as_bytes());
        assert_eq!(network.calls_for(&key.url), 1);
    }
    assert_eq!(bucket.keys().await.unwrap().len(), manifest.len());
}

#[tokio::test]
async fn test_install_fails_when_one_entry_is_missing() {
    let manifest = AssetManifest::new(["/", "/index.html", "/missing.js"]).unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(ScriptedNetwork::new());
    network.respond("/", ResponseSnapshot::new(200, "root"));
    network.respond("/index.html", ResponseSnapshot::new(200, "index"));
    let controller = OfflineCacheController::new(storage.clone(), network, FetchPolicy::default());

    let err = controller
        .on_install(&manifest, &version(1))
        .await
        .unwrap_err();

    assert!(
        matches!(err, InstallError::ManifestFetch { ref path, ref reason } if path == "/missing.js" && reason.contains("404"))
    );
    assert_eq!(controller.state(), LifecycleState::Redundant(version(1)));

    // Nothing from a failed fetch batch reaches the bucket
    let bucket = storage.open_bucket(&version(1)).await.unwrap();
    assert!(bucket.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_install_fails_when_offline_and_version_cannot_activate() {
    let manifest = AssetManifest::builtin();
    let network = Arc::new(ScriptedNetwork::serving(&manifest, 1));
    network.set_offline(true);
    let controller = OfflineCacheController::new(
        Arc::new(MemoryStorage::new()),
        network,
        FetchPolicy::default(),
    );

    assert!(controller.on_install(&manifest, &version(1)).await.is_err());
    assert!(controller.on_activate(&version(1)).await.is_err());
    assert_eq!(controller.current_version(), None);
}

#[tokio::test]
async fn test_failed_install_can_be_retried() {
    let manifest = AssetManifest::new(["/", "/index.html"]).unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(ScriptedNetwork::serving(&manifest, 1));
    network.set_offline(true);
    let controller = OfflineCacheController::new(storage, network.clone(), FetchPolicy::default());

    assert!(controller.on_install(&manifest, &version(1)).await.is_err());

    network.set_offline(false);
    let report = controller.on_install(&manifest, &version(1)).await.unwrap();
    assert_eq!(report.entries_cached, 2);
    assert_eq!(controller.state(), LifecycleState::Installed(version(1)));
}

#[tokio::test]
async fn test_install_report_counts_bytes() {
    let manifest = AssetManifest::new(["/a.css", "/b.js"]).unwrap();
    let network = Arc::new(ScriptedNetwork::new());
    network.respond("/a.css", ResponseSnapshot::new(200, vec![b'a'; 100]));
    network.respond("/b.js", ResponseSnapshot::new(200, vec![b'b'; 28]));
    let controller = OfflineCacheController::new(
        Arc::new(MemoryStorage::new()),
        network,
        FetchPolicy::default(),
    );

    let report = controller.on_install(&manifest, &version(3)).await.unwrap();
    assert_eq!(report.bytes_cached, 128);
    assert_eq!(report.version, version(3));
}

#[tokio::test]
async fn test_relative_manifest_entries_are_cached_under_rooted_paths() {
    let manifest = AssetManifest::new(["assets/img/icon-72x72.png"]).unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(ScriptedNetwork::serving(&manifest, 1));
    let controller = OfflineCacheController::new(storage.clone(), network, FetchPolicy::default());

    controller.on_install(&manifest, &version(1)).await.unwrap();

    let bucket = storage.open_bucket(&version(1)).await.unwrap();
    let cached = bucket
        .match_request(&RequestKey::get("/assets/img/icon-72x72.png"))
        .await
        .unwrap();
    assert!(cached.is_some());
}

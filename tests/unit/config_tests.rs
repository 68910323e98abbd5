// Configuration module unit tests

use kura::cache::CacheStorage;
use kura::config::*;
use kura::constants::{DEFAULT_CACHE_NAME, DEFAULT_MANIFEST};
use kura::controller::WriteBackMode;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(yaml.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_can_load_config_from_file() {
    let file = write_config(
        r#"
cache:
  name: "shop"
  generation: 7
  storage:
    backend: memory
network:
  origin: "https://shop.example.com"
  timeout_seconds: 5
"#,
    );

    let config = Config::from_file(file.path()).expect("Failed to load config");
    assert_eq!(config.cache_version().as_str(), "shop-v7");
    assert_eq!(config.cache.storage.backend, StorageBackend::Memory);
    assert_eq!(config.network.origin, "https://shop.example.com");
    assert_eq!(config.network_timeout().as_secs(), 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_is_reported() {
    let err = Config::from_file("/nonexistent/kura.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"));
}

#[test]
fn test_empty_file_uses_builtin_defaults() {
    let file = write_config("");
    let config = Config::from_file(file.path()).expect("Failed to load config");

    assert_eq!(config.cache.name, DEFAULT_CACHE_NAME);
    assert_eq!(config.manifest.len(), DEFAULT_MANIFEST.len());
    assert!(!config.fetch.fallback_on_error_status);
    assert_eq!(config.fetch.write_back, WriteBackMode::Detached);
}

#[test]
fn test_env_var_substitution_in_origin() {
    std::env::set_var("KURA_UNIT_TEST_ORIGIN", "http://10.0.0.5:9000");
    let config = Config::from_yaml_with_env(
        r#"
network:
  origin: "${KURA_UNIT_TEST_ORIGIN}"
"#,
    )
    .expect("Failed to substitute env var");

    assert_eq!(config.network.origin, "http://10.0.0.5:9000");
    std::env::remove_var("KURA_UNIT_TEST_ORIGIN");
}

#[test]
fn test_missing_env_var_is_rejected() {
    let err = Config::from_yaml_with_env(
        r#"
cache:
  name: "${KURA_UNIT_TEST_UNSET_VARIABLE}"
"#,
    )
    .unwrap_err();

    assert!(err.contains("KURA_UNIT_TEST_UNSET_VARIABLE"));
}

#[test]
fn test_custom_manifest_is_loaded() {
    let config = Config::from_yaml_with_env(
        r#"
manifest:
  - /
  - /index.html
  - /app.js
"#,
    )
    .unwrap();

    let entries: Vec<&str> = config.manifest.iter().collect();
    assert_eq!(entries, vec!["/", "/index.html", "/app.js"]);
}

#[test]
fn test_duplicate_manifest_entries_are_rejected() {
    let result = Config::from_yaml_with_env(
        r#"
manifest:
  - /app.js
  - app.js
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_fetch_policy_options_are_loaded() {
    let config = Config::from_yaml_with_env(
        r#"
fetch:
  fallback_document: /offline.html
  fallback_suffixes: [".html", ".htm"]
  write_back: awaited
  fallback_on_error_status: true
"#,
    )
    .unwrap();

    assert_eq!(config.fetch.fallback_document, "/offline.html");
    assert_eq!(config.fetch.fallback_suffixes.len(), 2);
    assert_eq!(config.fetch.write_back, WriteBackMode::Awaited);
    assert!(config.fetch.fallback_on_error_status);
}

#[test]
fn test_validation_rejects_bad_origin() {
    let config = Config::from_yaml_with_env(
        r#"
network:
  origin: "not a url"
"#,
    )
    .unwrap();

    let err = config.validate().unwrap_err();
    assert!(err.contains("Invalid network origin"));
}

#[test]
fn test_null_records_path_keeps_records_in_memory() {
    let config = Config::from_yaml_with_env(
        r#"
records:
  path: null
"#,
    )
    .unwrap();

    assert!(config.records_path().is_none());
    assert!(config.validate().is_ok());
}

#[tokio::test]
async fn test_disk_backend_creates_storage_root() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let dir = temp_dir.path().join("cache-root");
    let yaml = format!(
        "cache:\n  storage:\n    backend: disk\n    dir: \"{}\"\n",
        dir.display()
    );
    let config = Config::from_yaml_with_env(&yaml).unwrap();

    let storage = config.build_storage().await.expect("Failed to build storage");
    assert!(dir.is_dir());
    assert!(storage.list_versions().await.unwrap().is_empty());
}

#[test]
fn test_memory_backend_starts_empty() {
    let config = Config::from_yaml_with_env("cache:\n  storage:\n    backend: memory\n").unwrap();

    let versions = tokio_test::block_on(async {
        let storage = config.build_storage().await.unwrap();
        storage.list_versions().await.unwrap()
    });
    assert!(versions.is_empty());
}

#[test]
fn test_memory_backend_cannot_serve_later_commands() {
    let memory = Config::from_yaml_with_env("cache:\n  storage:\n    backend: memory\n").unwrap();
    let err = memory.require_persistent_storage("fetch").unwrap_err();
    assert!(err.contains("'fetch' needs the disk storage backend"));

    assert!(Config::default().require_persistent_storage("fetch").is_ok());
}

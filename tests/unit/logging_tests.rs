// Logging unit tests
//
// A global subscriber can be installed once per process, so the first
// initialization must succeed and every later one must report an error
// instead of panicking.

use kura::logging::{env_filter, init_subscriber, init_with_format, LogFormat};

#[test]
fn test_subscriber_initializes_once() {
    let first = init_subscriber();
    let second = init_with_format(LogFormat::Text);

    assert!(first.is_ok());
    assert!(second.is_err());

    tracing::info!(version = "medita-fish-cache-v1", "Logging initialized");
}

#[test]
fn test_env_filter_defaults_to_info() {
    if std::env::var("RUST_LOG").is_err() {
        assert_eq!(env_filter().to_string(), "info");
    }
}

#[test]
fn test_log_format_defaults_to_json() {
    assert_eq!(LogFormat::default(), LogFormat::Json);
}

// Constants module - centralized default values for configuration
//
// These defaults make an empty configuration file a valid one: the
// compiled-in manifest and cache version are what the application ships with.

// =============================================================================
// Cache defaults
// =============================================================================

/// Default cache name; the bucket version is `<name>-v<generation>`
pub const DEFAULT_CACHE_NAME: &str = "medita-fish-cache";

/// Default cache generation. Bump to roll out a new bucket.
pub const DEFAULT_CACHE_GENERATION: u64 = 1;

/// Default on-disk cache root
pub const DEFAULT_CACHE_DIR: &str = ".kura/cache";

/// Assets that must be present in the bucket after install
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/styles.css",
    "/script.js",
    "assets/img/icon-72x72.png",
    "assets/img/icon-96x96.png",
    "assets/img/icon-128x128.png",
    "assets/img/icon-144x144.png",
    "assets/img/icon-152x152.png",
    "assets/img/icon-192x192.png",
    "assets/img/icon-384x384.png",
    "assets/img/icon-512x512.png",
    "assets/img/screenshot-wide.png",
    "assets/img/screenshot-standard.png",
];

// =============================================================================
// Network defaults
// =============================================================================

/// Default origin that relative request paths resolve against
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";

/// Default network timeout in seconds
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Fetch policy defaults
// =============================================================================

/// Document served when a navigation request fails offline
pub const DEFAULT_FALLBACK_DOCUMENT: &str = "/index.html";

/// Path suffixes that qualify a request for the fallback document
pub const DEFAULT_FALLBACK_SUFFIXES: &[&str] = &[".html"];

// =============================================================================
// Record store defaults
// =============================================================================

/// Default record store file
pub const DEFAULT_RECORDS_PATH: &str = ".kura/records.json";

// Cache module
//
// Versioned bucket storage for the offline cache controller. Buckets hold
// (request key -> response snapshot) entries; the storage facility manages
// bucket versions.

pub mod disk;
pub mod entry;
pub mod error;
pub mod memory;
pub mod stats;
pub mod traits;

pub use disk::DiskStorage;
pub use entry::{CacheVersion, RequestKey, ResponseSnapshot};
pub use error::CacheError;
pub use memory::MemoryStorage;
pub use stats::{FetchStats, FetchStatsTracker};
pub use traits::{Bucket, CacheStorage};

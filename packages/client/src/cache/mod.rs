//! HTTP response caching
//!
//! This module provides an RFC 7234 private (or shared) cache that wraps any
//! [`Transport`](crate::transport::Transport):
//! - `cache_key`: request identity, including the `Vary` dimension
//! - `cache_entry`: stored exchanges, cacheability and age arithmetic
//! - `freshness`: the fresh / stale / unusable decision
//! - `store`: the pluggable backend contract, an in-memory skiplist store
//!   and a serializing adapter for byte-oriented backends
//! - `interceptor`: the caching transport itself

pub mod cache_config;
pub mod cache_control;
pub mod cache_entry;
pub mod cache_key;
pub mod cache_stats;
pub mod clock;
pub mod freshness;
pub mod http_date;
pub mod interceptor;
pub mod store;

pub use cache_config::{CacheConfig, MemoryStoreConfig};
pub use cache_control::CacheControl;
pub use cache_entry::{CacheEntry, EntryParts, NotCacheable};
pub use cache_key::{CacheKey, Vary};
pub use cache_stats::{CacheStats, CacheStatsSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use freshness::Freshness;
pub use http_date::{HttpDateParseError, httpdate};
pub use interceptor::{CacheBuilder, CachingTransport};
pub use store::{BlobBackend, CacheStore, MemoryBlobBackend, MemoryStore, SerializedStore};

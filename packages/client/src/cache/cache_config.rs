//! Cache configuration and preset policies
//!
//! `CacheConfig` drives the caching decisions (what may be stored, whether
//! stale entries may cover for a failing origin). `MemoryStoreConfig` sizes
//! the in-memory backend.

use serde::{Deserialize, Serialize};

/// Caching policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Statuses that may be stored without an explicit freshness directive
    pub cacheable_statuses: Vec<u16>,
    /// Serve a stale entry, marked with `Warning: 111`, when the transport fails
    pub stale_if_error: bool,
    /// Bodies larger than this are never stored
    pub max_entry_bytes: usize,
    /// Behave as a shared cache: refuse `private`, honor `s-maxage`
    pub shared: bool,
    /// Serialize concurrent revalidations of the same key
    pub coalesce_revalidations: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cacheable_statuses: vec![200, 203, 204, 300, 301, 308, 404, 405, 410, 414, 501],
            stale_if_error: false,
            max_entry_bytes: 10 * 1024 * 1024, // 10MB
            shared: false,
            coalesce_revalidations: false,
        }
    }
}

impl CacheConfig {
    /// Configuration for a cache shared between users, such as a gateway
    #[must_use]
    pub fn shared_cache() -> Self {
        Self {
            shared: true,
            ..Self::default()
        }
    }

    /// Keep serving through origin failures and collapse revalidation bursts
    #[must_use]
    pub fn resilient() -> Self {
        Self {
            stale_if_error: true,
            coalesce_revalidations: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_cacheable_status(&self, status: u16) -> bool {
        self.cacheable_statuses.contains(&status)
    }
}

/// Capacity limits for [`MemoryStore`](super::store::MemoryStore)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Maximum estimated memory usage in bytes
    pub max_memory_bytes: u64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_memory_bytes: 100 * 1024 * 1024, // 100MB
        }
    }
}

//! Pluggable storage for cache entries
//!
//! A [`CacheStore`] maps [`CacheKey`]s to [`CacheEntry`] snapshots. Stores
//! never expire entries on their own: freshness is decided when an entry is
//! read. Every operation must be atomic per key, so a `put` racing a `get`
//! yields either the old entry or the new one.

use std::sync::Arc;

use async_trait::async_trait;

use super::cache_entry::CacheEntry;
use super::cache_key::CacheKey;
use crate::error::Result;

pub mod memory;
pub mod serialized;

pub use memory::MemoryStore;
pub use serialized::{BlobBackend, EntryRecord, MemoryBlobBackend, SerializedStore};

/// Predicate selecting keys to invalidate
pub type KeyPredicate<'a> = &'a (dyn Fn(&CacheKey) -> bool + Send + Sync);

#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert or replace the entry for `key`
    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()>;

    /// Remove one key, reporting whether it was present
    async fn remove(&self, key: &CacheKey) -> Result<bool>;

    /// Remove every key matching `predicate`, returning how many went
    async fn invalidate(&self, predicate: KeyPredicate<'_>) -> Result<usize>;
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        (**self).get(key).await
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        (**self).put(key, entry).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        (**self).remove(key).await
    }

    async fn invalidate(&self, predicate: KeyPredicate<'_>) -> Result<usize> {
        (**self).invalidate(predicate).await
    }
}

//! In-memory store on a lock-free skiplist
//!
//! Replacing a value in the `SkipMap` is a single atomic insert and readers
//! keep the value they looked up alive, so concurrent `get`/`put` on a key
//! never observe a partial entry. Capacity is enforced by evicting the least
//! recently used quarter of the entries; nothing ever expires.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use crossbeam_skiplist::SkipMap;

use super::{CacheStore, KeyPredicate};
use crate::cache::cache_config::MemoryStoreConfig;
use crate::cache::cache_entry::CacheEntry;
use crate::cache::cache_key::CacheKey;
use crate::error::Result;

struct Slot {
    /// Unique per insert, tells a writer whether its own slot landed
    id: u64,
    entry: CacheEntry,
    size_bytes: u64,
    last_access: AtomicU64,
}

/// Bounded in-process [`CacheStore`]
pub struct MemoryStore {
    entries: SkipMap<CacheKey, Slot>,
    config: MemoryStoreConfig,
    memory_usage: AtomicU64,
    /// Logical clock ordering accesses for LRU eviction
    access_tick: AtomicU64,
    evictions: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .field("memory_usage", &self.memory_usage.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            entries: SkipMap::new(),
            config,
            memory_usage: AtomicU64::new(0),
            access_tick: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimated bytes held
    #[must_use]
    pub fn memory_usage(&self) -> u64 {
        self.memory_usage.load(Ordering::Relaxed)
    }

    /// Entries dropped by capacity eviction so far
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.memory_usage.store(0, Ordering::Relaxed);
    }

    fn tick(&self) -> u64 {
        self.access_tick.fetch_add(1, Ordering::Relaxed)
    }

    fn release(&self, bytes: u64) {
        let _ = self
            .memory_usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    fn over_limits(&self, extra_entries: usize, extra_bytes: u64) -> bool {
        self.entries.len() + extra_entries > self.config.max_entries
            || self.memory_usage() + extra_bytes > self.config.max_memory_bytes
    }

    /// Evict least recently used entries, at most a quarter of the store
    fn evict_lru_entries(&self, incoming_bytes: u64) -> usize {
        let mut candidates: Vec<(CacheKey, u64)> = self
            .entries
            .iter()
            .map(|slot| {
                (
                    slot.key().clone(),
                    slot.value().last_access.load(Ordering::Relaxed),
                )
            })
            .collect();
        candidates.sort_by_key(|(_, last_access)| *last_access);

        let target = (candidates.len() / 4).max(1);
        let mut evicted = 0;
        for (key, _) in candidates.into_iter().take(target) {
            if let Some(removed) = self.entries.remove(&key) {
                self.release(removed.value().size_bytes);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                evicted += 1;
                if !self.over_limits(1, incoming_bytes) {
                    break;
                }
            }
        }
        evicted
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|slot| {
            slot.value().last_access.store(self.tick(), Ordering::Relaxed);
            slot.value().entry.clone()
        }))
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        if self.config.max_entries == 0 {
            return Ok(());
        }
        let size_bytes = entry.size_bytes();
        if size_bytes > self.config.max_memory_bytes {
            tracing::debug!(
                target: "revcache::cache::store",
                key = %key,
                size_bytes,
                max_memory = self.config.max_memory_bytes,
                "Entry larger than the whole store, not kept"
            );
            return Ok(());
        }

        let replaced = self.entries.get(&key).map(|slot| slot.value().size_bytes);
        let extra_entries = usize::from(replaced.is_none());
        if self.over_limits(extra_entries, size_bytes.saturating_sub(replaced.unwrap_or(0))) {
            let evicted = self.evict_lru_entries(size_bytes);
            tracing::debug!(
                target: "revcache::cache::store",
                evicted,
                entries = self.entries.len(),
                memory = self.memory_usage(),
                "Evicted entries to make room"
            );
        }

        // A slot's size is counted before it becomes visible and released
        // only by the remove that unlinks it.
        let id = self.tick();
        loop {
            if let Some(previous) = self.entries.remove(&key) {
                self.release(previous.value().size_bytes);
            }
            self.memory_usage.fetch_add(size_bytes, Ordering::Relaxed);
            let landed = self.entries.get_or_insert(
                key.clone(),
                Slot {
                    id,
                    entry: entry.clone(),
                    size_bytes,
                    last_access: AtomicU64::new(self.tick()),
                },
            );
            if landed.value().id == id {
                break;
            }
            self.release(size_bytes);
        }
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(match self.entries.remove(key) {
            Some(removed) => {
                self.release(removed.value().size_bytes);
                true
            }
            None => false,
        })
    }

    async fn invalidate(&self, predicate: KeyPredicate<'_>) -> Result<usize> {
        let matching: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|slot| predicate(slot.key()))
            .map(|slot| slot.key().clone())
            .collect();

        let mut removed = 0;
        for key in matching {
            if let Some(slot) = self.entries.remove(&key) {
                self.release(slot.value().size_bytes);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

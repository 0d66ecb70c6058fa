//! The caching transport
//!
//! [`CachingTransport`] decorates any [`Transport`]. Per request it decides
//! whether to answer from the store, revalidate a stored entry with a
//! conditional request, fetch in full, or just invalidate and pass through.
//!
//! Lookups use the base key (method and URI) first. That slot always holds
//! the newest response for the URI; when it carries `Vary` and was selected
//! by different request headers, the variant key built from the new
//! request's values is tried next. Responses with `Vary` are written under
//! both keys.
//!
//! Store writes and invalidations run on their own task. A caller that goes
//! away mid-flight never leaves a write half applied.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use http::header::{
    CONTENT_LOCATION, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE,
    LOCATION, RANGE, WARNING,
};
use http::{HeaderMap, HeaderValue, StatusCode};
use tokio::sync::{Mutex, OwnedMutexGuard};
use url::Url;

use super::cache_config::CacheConfig;
use super::cache_control::CacheControl;
use super::cache_entry::CacheEntry;
use super::cache_key::{CacheKey, Vary, normalize_uri};
use super::cache_stats::CacheStats;
use super::clock::{Clock, SystemClock};
use super::freshness::{self, Freshness};
use super::store::{CacheStore, MemoryStore};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

const STALE_WARNING: &str = "110 - \"Response is Stale\"";
const REVALIDATION_FAILED_WARNING: &str = "111 - \"Revalidation Failed\"";

type LockMap = DashMap<CacheKey, Arc<Mutex<()>>>;

/// Configures and builds a [`CachingTransport`]
#[derive(Default)]
pub struct CacheBuilder {
    config: CacheConfig,
    store: Option<Arc<dyn CacheStore>>,
    clock: Option<Arc<dyn Clock>>,
    stats: Option<Arc<CacheStats>>,
}

impl std::fmt::Debug for CacheBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("config", &self.config)
            .field("custom_store", &self.store.is_some())
            .field("clock", &self.clock)
            .finish()
    }
}

impl CacheBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Storage backend, a fresh [`MemoryStore`] if never set
    #[must_use]
    pub fn store(mut self, store: impl CacheStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Share one backend between several caching transports
    #[must_use]
    pub fn shared_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Collect statistics into an existing set of counters
    #[must_use]
    pub fn stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    #[must_use]
    pub fn cacheable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.config.cacheable_statuses = statuses.into_iter().collect();
        self
    }

    #[must_use]
    pub fn stale_if_error(mut self, enabled: bool) -> Self {
        self.config.stale_if_error = enabled;
        self
    }

    #[must_use]
    pub fn max_entry_bytes(mut self, bytes: usize) -> Self {
        self.config.max_entry_bytes = bytes;
        self
    }

    #[must_use]
    pub fn shared(mut self, shared: bool) -> Self {
        self.config.shared = shared;
        self
    }

    #[must_use]
    pub fn coalesce_revalidations(mut self, enabled: bool) -> Self {
        self.config.coalesce_revalidations = enabled;
        self
    }

    pub fn build<T: Transport>(self, transport: T) -> CachingTransport<T> {
        tracing::debug!(
            target: "revcache::builder",
            config = ?self.config,
            custom_store = self.store.is_some(),
            "Building caching transport"
        );
        CachingTransport {
            inner: transport,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::default())),
            config: self.config,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            stats: self.stats.unwrap_or_default(),
            locks: Arc::new(DashMap::new()),
        }
    }
}

/// A [`Transport`] that answers from and maintains an HTTP cache
pub struct CachingTransport<T> {
    inner: T,
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    stats: Arc<CacheStats>,
    locks: Arc<LockMap>,
}

impl<T> std::fmt::Debug for CachingTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingTransport")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// An entry found for a request and the key it was found under
struct Found {
    key: CacheKey,
    entry: CacheEntry,
}

impl<T: Transport> CachingTransport<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        CacheBuilder::new().build(transport)
    }

    #[must_use]
    pub fn builder() -> CacheBuilder {
        CacheBuilder::new()
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn now(&self) -> SystemTime {
        self.clock.now()
    }

    async fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                self.stats.record_error();
                tracing::warn!(
                    target: "revcache::cache",
                    key = %key,
                    error = %err,
                    "Cache read failed, treating as miss"
                );
                None
            }
        }
    }

    async fn lookup(&self, base_key: &CacheKey, request_headers: &HeaderMap) -> Option<Found> {
        let entry = self.read(base_key).await?;
        if entry.matches_vary(request_headers) {
            return Some(Found {
                key: base_key.clone(),
                entry,
            });
        }
        let Vary::Headers(names) = entry.vary() else {
            return None;
        };
        let variant_key = base_key.with_vary(names, request_headers);
        let entry = self.read(&variant_key).await?;
        entry.matches_vary(request_headers).then_some(Found {
            key: variant_key,
            entry,
        })
    }

    /// Write `entry` under its base key and, with `Vary`, its variant key
    async fn write(&self, base_key: &CacheKey, entry: CacheEntry) {
        let mut keys = vec![base_key.clone()];
        if let Vary::Headers(names) = entry.vary() {
            keys.push(base_key.with_vary(names, entry.request_headers()));
        }
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move {
            for key in keys {
                store.put(key, entry.clone()).await?;
            }
            Ok::<_, Error>(())
        });

        match task.await {
            Ok(Ok(())) => {
                self.stats.record_store();
                tracing::debug!(target: "revcache::cache", key = %base_key, "Stored response");
            }
            Ok(Err(err)) => {
                self.stats.record_error();
                tracing::warn!(
                    target: "revcache::cache",
                    key = %base_key,
                    error = %err,
                    "Cache write failed"
                );
            }
            Err(err) => {
                self.stats.record_error();
                tracing::warn!(target: "revcache::cache", error = %err, "Cache write task failed");
            }
        }
    }

    async fn remove(&self, key: &CacheKey) {
        let store = Arc::clone(&self.store);
        let owned = key.clone();
        match tokio::spawn(async move { store.remove(&owned).await }).await {
            Ok(Ok(true)) => self.stats.record_invalidations(1),
            Ok(Ok(false)) => {}
            Ok(Err(err)) => {
                self.stats.record_error();
                tracing::warn!(target: "revcache::cache", key = %key, error = %err, "Cache remove failed");
            }
            Err(err) => {
                self.stats.record_error();
                tracing::warn!(target: "revcache::cache", error = %err, "Cache remove task failed");
            }
        }
    }

    /// Drop every stored method and variant for the resource at `url`
    async fn invalidate_uri(&self, url: &Url) {
        let store = Arc::clone(&self.store);
        let uri = normalize_uri(url);
        let target = uri.clone();
        let task = tokio::spawn(async move {
            store
                .invalidate(&move |key: &CacheKey| key.uri() == target)
                .await
        });
        match task.await {
            Ok(Ok(removed)) => {
                self.stats.record_invalidations(removed);
                if removed > 0 {
                    tracing::debug!(target: "revcache::cache", uri = %uri, removed, "Invalidated entries");
                }
            }
            Ok(Err(err)) => {
                self.stats.record_error();
                tracing::warn!(target: "revcache::cache", uri = %uri, error = %err, "Cache invalidation failed");
            }
            Err(err) => {
                self.stats.record_error();
                tracing::warn!(target: "revcache::cache", error = %err, "Cache invalidation task failed");
            }
        }
    }

    /// Unsafe methods: invalidate, execute, then invalidate what the response names
    async fn execute_unsafe(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url().clone();
        self.invalidate_uri(&url).await;

        let response = self.inner.execute(request).await?;
        if response.status().as_u16() < 400 {
            self.invalidate_uri(&url).await;
            for header in [LOCATION, CONTENT_LOCATION] {
                let Some(target) = response
                    .header_str(header)
                    .and_then(|value| url.join(value).ok())
                else {
                    continue;
                };
                if target.origin() == url.origin() && normalize_uri(&target) != normalize_uri(&url) {
                    self.invalidate_uri(&target).await;
                }
            }
        }
        Ok(response)
    }

    /// Send `request` as is; store the answer if it may be stored
    async fn fetch(
        &self,
        base_key: &CacheKey,
        request: HttpRequest,
        fallback: Option<&CacheEntry>,
    ) -> Result<HttpResponse> {
        let snapshot = request.without_body();
        let request_time = self.now();
        let response = match self.inner.execute(request).await {
            Ok(response) => response,
            Err(err) => return self.stale_or_error(err, fallback),
        };
        let response_time = self.now();
        if let Some(entry) = self.classify(base_key, &snapshot, &response, request_time, response_time) {
            self.write(base_key, entry).await;
        }
        Ok(response)
    }

    /// Snapshot a full response if it may be stored
    ///
    /// Synchronous so no borrow of the request outlives it; the caller
    /// writes the owned entry afterwards.
    fn classify(
        &self,
        base_key: &CacheKey,
        request: &HttpRequest,
        response: &HttpResponse,
        request_time: SystemTime,
        response_time: SystemTime,
    ) -> Option<CacheEntry> {
        match CacheEntry::from_exchange(request, response, request_time, response_time, &self.config) {
            Ok(entry) => Some(entry),
            Err(reason) => {
                tracing::debug!(
                    target: "revcache::cache",
                    key = %base_key,
                    reason = %reason,
                    "Response not stored"
                );
                None
            }
        }
    }

    /// Serve `fallback` for a failed transport when stale-if-error allows it
    fn stale_or_error(&self, err: Error, fallback: Option<&CacheEntry>) -> Result<HttpResponse> {
        let Some(entry) = fallback else {
            return Err(err);
        };
        if !self.config.stale_if_error
            || !err.is_transport()
            || !freshness::allows_stale_on_error(entry, self.config.shared)
        {
            return Err(err);
        }

        tracing::warn!(
            target: "revcache::cache",
            error = %err,
            "Transport failed, serving stale entry"
        );
        self.stats.record_stale_served();
        let mut response = entry.to_response(entry.current_age(self.now()));
        response
            .headers_mut()
            .append(WARNING, HeaderValue::from_static(REVALIDATION_FAILED_WARNING));
        Ok(response)
    }

    /// Conditional request for a stale entry
    async fn revalidate(
        &self,
        base_key: &CacheKey,
        found: Found,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        self.stats.record_revalidation();
        let snapshot = request.without_body();
        let retry = request.try_clone();

        let mut conditional = request;
        found.entry.apply_validators(conditional.headers_mut());
        tracing::debug!(
            target: "revcache::cache",
            key = %found.key,
            etag = found.entry.etag(),
            last_modified = found.entry.last_modified(),
            "Revalidating stale entry"
        );

        let request_time = self.now();
        let response = match self.inner.execute(conditional).await {
            Ok(response) => response,
            Err(err) => return self.stale_or_error(err, Some(&found.entry)),
        };
        let response_time = self.now();

        if response.status() != StatusCode::NOT_MODIFIED {
            match self.classify(base_key, &snapshot, &response, request_time, response_time) {
                Some(entry) => self.write(base_key, entry).await,
                None => self.remove(&found.key).await,
            }
            return Ok(response);
        }

        self.stats.record_not_modified();
        if found.entry.is_contradicted_by(&response) {
            tracing::debug!(
                target: "revcache::cache",
                key = %found.key,
                "304 names a different validator, refetching"
            );
            self.remove(&found.key).await;
            return match retry {
                Some(retry) => self.fetch(base_key, retry, None).await,
                None => Ok(response),
            };
        }

        let merged = found.entry.merge_not_modified(
            &response,
            request_time,
            response_time,
            self.config.shared,
        );
        let age = merged.current_age(response_time);
        let served = merged.to_response(age);
        self.write(base_key, merged).await;
        Ok(served)
    }

    /// Serialize work on `key` when coalescing is enabled
    async fn coalesce(&self, key: &CacheKey) -> Option<RevalidationLock> {
        if !self.config.coalesce_revalidations {
            return None;
        }
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = Arc::clone(&lock).lock_owned().await;
        Some(RevalidationLock {
            locks: Arc::clone(&self.locks),
            key: key.clone(),
            lock,
            guard: Some(guard),
        })
    }

    fn serve(&self, found: &Found, freshness: Freshness) -> Option<HttpResponse> {
        match freshness {
            Freshness::Fresh { age } => {
                self.stats.record_hit();
                tracing::debug!(target: "revcache::cache", key = %found.key, age = age.as_secs(), "Cache hit");
                Some(found.entry.to_response(age))
            }
            Freshness::StaleAcceptable { age } => {
                self.stats.record_hit();
                self.stats.record_stale_served();
                tracing::debug!(target: "revcache::cache", key = %found.key, age = age.as_secs(), "Serving stale entry under max-stale");
                let mut response = found.entry.to_response(age);
                response
                    .headers_mut()
                    .append(WARNING, HeaderValue::from_static(STALE_WARNING));
                Some(response)
            }
            Freshness::StaleRevalidatable { .. } | Freshness::Unusable => None,
        }
    }

    async fn execute_cacheable(&self, base_key: CacheKey, request: HttpRequest) -> Result<HttpResponse> {
        let request_cc = CacheControl::parse_request(request.headers());
        if request_cc.no_store {
            tracing::debug!(target: "revcache::cache", key = %base_key, "Request no-store, bypassing cache");
            return self.inner.execute(request).await;
        }
        if bypasses_lookup(request.headers()) {
            tracing::debug!(target: "revcache::cache", key = %base_key, "Conditional or range request, skipping lookup");
            return self.fetch(&base_key, request, None).await;
        }

        let shared = self.config.shared;
        let Some(mut found) = self.lookup(&base_key, request.headers()).await else {
            self.stats.record_miss();
            if request_cc.only_if_cached {
                return Ok(gateway_timeout());
            }
            tracing::debug!(target: "revcache::cache", key = %base_key, "Cache miss");
            return self.fetch(&base_key, request, None).await;
        };

        let mut freshness = freshness::evaluate(&found.entry, self.now(), &request_cc, shared);
        if let Some(response) = self.serve(&found, freshness) {
            return Ok(response);
        }
        if request_cc.only_if_cached {
            self.stats.record_miss();
            return Ok(gateway_timeout());
        }

        let revalidation_lock = self.coalesce(&base_key).await;
        if revalidation_lock.is_some() {
            // Another request may have refreshed the entry while this one waited
            match self.lookup(&base_key, request.headers()).await {
                Some(latest) => {
                    freshness = freshness::evaluate(&latest.entry, self.now(), &request_cc, shared);
                    if let Some(response) = self.serve(&latest, freshness) {
                        return Ok(response);
                    }
                    found = latest;
                }
                None => {
                    self.stats.record_miss();
                    return self.fetch(&base_key, request, None).await;
                }
            }
        }

        match freshness {
            Freshness::StaleRevalidatable { .. } => self.revalidate(&base_key, found, request).await,
            _ => {
                self.stats.record_miss();
                tracing::debug!(target: "revcache::cache", key = %found.key, "Entry unusable, refetching");
                self.remove(&found.key).await;
                self.fetch(&base_key, request, Some(&found.entry)).await
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for CachingTransport<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if !request.method().is_safe() {
            return self.execute_unsafe(request).await;
        }
        let base_key = CacheKey::for_request(&request);
        match base_key {
            Some(base_key) => self.execute_cacheable(base_key, request).await,
            // OPTIONS and TRACE: no lookup, no storage, no invalidation
            None => self.inner.execute(request).await,
        }
    }
}

/// Holds the per-key lock; forgets the lock once nobody else waits on it
struct RevalidationLock {
    locks: Arc<LockMap>,
    key: CacheKey,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RevalidationLock {
    fn drop(&mut self) {
        self.guard.take();
        // the map and this struct hold the only references when nobody waits
        self.locks.remove_if(&self.key, |_, current| {
            Arc::ptr_eq(current, &self.lock) && Arc::strong_count(current) == 2
        });
    }
}

/// Requests that bring their own conditionals or ask for a range
fn bypasses_lookup(headers: &HeaderMap) -> bool {
    [IF_NONE_MATCH, IF_MODIFIED_SINCE, IF_MATCH, IF_UNMODIFIED_SINCE, IF_RANGE, RANGE]
        .iter()
        .any(|name| headers.contains_key(name))
}

fn gateway_timeout() -> HttpResponse {
    HttpResponse::empty(StatusCode::GATEWAY_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_and_range_requests_skip_lookup() {
        let mut headers = HeaderMap::new();
        assert!(!bypasses_lookup(&headers));
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-9"));
        assert!(bypasses_lookup(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"v1\""));
        assert!(bypasses_lookup(&headers));
    }

    #[tokio::test]
    async fn lock_entry_is_forgotten_after_last_holder() {
        let locks: Arc<LockMap> = Arc::new(DashMap::new());
        let url = Url::parse("http://example.com/").unwrap();
        let key = CacheKey::new(&http::Method::GET, &url);

        let lock = locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = Arc::clone(&lock).lock_owned().await;
        drop(RevalidationLock {
            locks: Arc::clone(&locks),
            key,
            lock,
            guard: Some(guard),
        });
        assert!(locks.is_empty());
    }
}

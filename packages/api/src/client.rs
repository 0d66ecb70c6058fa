//! The `Client` entry point

use std::fmt;
use std::sync::Arc;

use revcache_client::cache::{CacheBuilder, CacheStats};
use revcache_client::redirect::{FollowRedirects, Policy};
use revcache_client::{HyperTransport, Result, Transport};

use crate::builder::RequestBuilder;

/// Shared handle that starts requests against one transport
///
/// Requests follow redirects under the default [`Policy`] unless the
/// request or [`redirect_policy`](Self::redirect_policy) says otherwise.
/// Redirects are followed outside the cache, so every hop is cached on
/// its own. Cloning is cheap; clones share the transport and, when
/// caching, the cache itself.
#[derive(Clone)]
pub struct Client {
    /// The transport or cache each hop is sent to
    inner: Arc<dyn Transport>,
    transport: Arc<dyn Transport>,
    cache_stats: Option<Arc<CacheStats>>,
}

impl Client {
    /// Send requests straight through `transport`
    pub fn new(transport: impl Transport) -> Self {
        Self::assemble(Arc::new(transport), None)
    }

    /// Send requests through a cache configured by `cache` in front of `transport`
    pub fn with_cache<T: Transport>(transport: T, cache: CacheBuilder) -> Self {
        let caching = cache.build(transport);
        let cache_stats = Arc::clone(caching.stats());
        Self::assemble(Arc::new(caching), Some(cache_stats))
    }

    fn assemble(inner: Arc<dyn Transport>, cache_stats: Option<Arc<CacheStats>>) -> Self {
        Self {
            transport: Arc::new(FollowRedirects::new(Arc::clone(&inner))),
            inner,
            cache_stats,
        }
    }

    /// Replace the redirect policy; [`Policy::none`] returns every redirect as is
    #[must_use]
    pub fn redirect_policy(mut self, policy: Policy) -> Self {
        self.transport = Arc::new(FollowRedirects::new(Arc::clone(&self.inner)).policy(policy));
        self
    }

    /// Start a request for `url`
    ///
    /// User info in the URL becomes Basic authentication and its query
    /// string seeds the ordered query parameters.
    ///
    /// # Errors
    ///
    /// Fails when `url` does not parse, carries an empty user info section
    /// or has a malformed query string.
    pub fn url(&self, url: &str) -> Result<RequestBuilder> {
        RequestBuilder::new(Arc::clone(&self.transport), url)
    }

    /// Counters of the cache in front of the transport, if any
    #[must_use]
    pub fn cache_stats(&self) -> Option<&Arc<CacheStats>> {
        self.cache_stats.as_ref()
    }

    /// The outermost transport, redirect handling included
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl Default for Client {
    /// A private in-memory cache over the hyper transport
    fn default() -> Self {
        Self::with_cache(HyperTransport::new(), CacheBuilder::new())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("cached", &self.cache_stats.is_some())
            .finish_non_exhaustive()
    }
}

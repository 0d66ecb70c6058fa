//! revcache prelude
//!
//! The types needed to build, cache and execute requests.

// Essential HTTP types
pub use crate::http::{BodyStream, HttpRequest, HttpResponse, RequestBody};

// Error types
pub use crate::error::{Error, HttpError, Kind, Result};

// Execution
pub use crate::middleware::{Middleware, MiddlewareChain};
pub use crate::transport::{HyperTransport, Transport, TransportConfig};

// Caching
pub use crate::cache::{
    CacheBuilder, CacheConfig, CacheKey, CacheStats, CacheStore, CachingTransport, Clock,
    ManualClock, MemoryStore, MemoryStoreConfig, SerializedStore, SystemClock,
};

// Redirects
pub use crate::redirect::{FollowRedirects, Policy as RedirectPolicy};

// Proxies
pub use crate::proxy::{ProxyAuthScheme, ProxyServer, ProxyType};

// HTTP standard types from http crate
pub use ::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};

// URL handling
pub use url::Url;

//! # revcache client
//!
//! HTTP exchange types, the [`Transport`] contract and an RFC 7234 response
//! cache that decorates any transport.
//!
//! ## Features
//!
//! - **Transparent caching**: [`CachingTransport`] is a drop-in `Transport`
//! - **Revalidation** with `ETag`/`Last-Modified` and `304` merging
//! - **`Vary`-aware keys** and invalidation by unsafe methods
//! - **Pluggable stores**: lock-free in-memory skiplist, or any blob backend
//! - **Opt-in stale-if-error** and revalidation coalescing
//! - **Redirect following** as another decorating transport
//! - **hyper transport** with connection pooling and timeouts
//! - **Middleware** around any transport
//!
//! ## Usage
//!
//! ```rust,no_run
//! use revcache_client::prelude::*;
//!
//! # async fn run() -> revcache_client::Result<()> {
//! let transport = CacheBuilder::new()
//!     .config(CacheConfig::resilient())
//!     .build(HyperTransport::new());
//!
//! let url = Url::parse("http://example.com/resource").map_err(revcache_client::error::invalid_url)?;
//! let first = transport.execute(HttpRequest::get(url.clone())).await?;
//! let second = transport.execute(HttpRequest::get(url)).await?;
//! assert_eq!(first.body(), second.body());
//! println!("hit ratio: {:.2}", transport.stats().hit_ratio());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod http;
pub mod middleware;
pub mod proxy;
pub mod redirect;
pub mod transport;

// Prelude with canonical types
pub mod prelude;

pub use crate::cache::{CacheBuilder, CacheConfig, CacheStore, CachingTransport, MemoryStore};
pub use crate::error::{Error, HttpError, Result};
pub use crate::http::{HttpRequest, HttpResponse, RequestBody};
pub use crate::transport::{HyperTransport, Transport};

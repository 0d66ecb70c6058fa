//! revcache Public API
//!
//! A fluent request builder over any [`Transport`], with RFC 7234 response
//! caching introduced by substitution: a [`Client`] built with
//! [`Client::with_cache`] answers from its cache without any change to the
//! code that builds requests.
//!
//! ```no_run
//! use revcache::{Client, CacheBuilder, HyperTransport};
//!
//! # async fn run() -> revcache::Result<()> {
//! let client = Client::with_cache(HyperTransport::new(), CacheBuilder::new());
//! let response = client
//!     .url("https://api.example.com/users?page=2")?
//!     .bearer_auth("token")
//!     .get()
//!     .await?;
//! println!("{} ({} cached hits)", response.status(), client.cache_stats().map_or(0, |s| s.snapshot().hits));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod builder;
pub mod client;

pub use builder::*;
pub use client::Client;

// Re-export important types from client package
pub use revcache_client::cache::{CacheBuilder, CacheConfig, CacheStats, MemoryStore};
pub use revcache_client::proxy::{ProxyAuthScheme, ProxyServer, ProxyType};
pub use revcache_client::redirect::Policy as RedirectPolicy;
pub use revcache_client::{
    Error, HttpError, HttpRequest, HttpResponse, HyperTransport, Result, Transport,
};

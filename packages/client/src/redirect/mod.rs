//! Redirect handling
//!
//! [`FollowRedirects`] decorates a [`Transport`](crate::transport::Transport)
//! and follows `301`, `302`, `303`, `307` and `308` answers up to a chain of
//! 10 hops by default. A [`Policy`] changes the limit or decides per hop;
//! a request can opt in or out with
//! [`HttpRequest::with_follow_redirects`](crate::http::HttpRequest::with_follow_redirects).
//!
//! Placed outside a caching transport, every hop is looked up and stored
//! on its own, so a cacheable `301`/`308` is answered from the cache.

mod attempt;
mod headers;
mod policy;
mod transport;

pub use attempt::{Action, Attempt};
pub use policy::Policy;
pub use transport::FollowRedirects;

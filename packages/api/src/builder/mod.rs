//! Request builder API modules
//!
//! Provides the fluent API for building and executing HTTP requests
//! through any transport, cached or not.

pub mod auth;
pub mod body;
pub mod cookies;
pub mod core;
pub mod headers;
pub mod methods;
pub mod query;
pub mod sign;

pub use auth::{AuthScheme, UserInfoError};
pub use body::Body;
pub use self::core::*;
pub use headers::*;
pub use query::QueryStringError;
pub use sign::RequestSigner;

//! The request execution contract
//!
//! A [`Transport`] turns one [`HttpRequest`] into one [`HttpResponse`] or a
//! failure. Caching and middleware are both transports wrapping another
//! transport, so either can be introduced by substitution.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};

pub mod hyper;

pub use self::hyper::{HyperTransport, TransportConfig};

/// Execute a single HTTP exchange
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request).await
    }
}

//! Request/response middleware
//!
//! A [`MiddlewareChain`] folds hooks around a [`Transport`]: request hooks
//! run in insertion order before the exchange, response and error hooks in
//! reverse order after it. The wrapped result is itself a `Transport`, so a
//! chain can sit inside or outside a caching transport.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

pub mod headers;
pub use headers::DefaultHeaders;

/// HTTP middleware hooks
pub trait Middleware: Send + Sync {
    /// Process request before sending
    fn process_request(&self, request: HttpRequest) -> Result<HttpRequest> {
        Ok(request)
    }

    /// Process response after receiving
    fn process_response(&self, response: HttpResponse) -> Result<HttpResponse> {
        Ok(response)
    }

    /// Inspect or replace a failure on its way back to the caller
    fn handle_error(&self, error: Error) -> Error {
        error
    }
}

/// Middleware chain for sequential processing
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Fold this chain around `transport`
    pub fn wrap<T: Transport>(self, transport: T) -> MiddlewareTransport<T> {
        MiddlewareTransport {
            middlewares: self.middlewares.into(),
            inner: transport,
        }
    }
}

/// A [`Transport`] running a middleware chain around another transport
pub struct MiddlewareTransport<T> {
    middlewares: Arc<[Arc<dyn Middleware>]>,
    inner: T,
}

impl<T> MiddlewareTransport<T> {
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn fail(&self, mut error: Error) -> Error {
        for middleware in self.middlewares.iter().rev() {
            error = middleware.handle_error(error);
        }
        error
    }
}

#[async_trait]
impl<T: Transport> Transport for MiddlewareTransport<T> {
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        for middleware in self.middlewares.iter() {
            request = middleware.process_request(request).map_err(|e| self.fail(e))?;
        }

        let mut response = match self.inner.execute(request).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail(error)),
        };

        for middleware in self.middlewares.iter().rev() {
            response = middleware
                .process_response(response)
                .map_err(|e| self.fail(e))?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use url::Url;

    use super::*;

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            Ok(HttpResponse::new(StatusCode::OK, request.headers().clone(), Bytes::new()))
        }
    }

    struct Failing;

    #[async_trait]
    impl Transport for Failing {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Err(crate::error::connect("refused"))
        }
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn process_request(&self, request: HttpRequest) -> Result<HttpRequest> {
            self.log.lock().unwrap().push(format!("request:{}", self.name));
            Ok(request)
        }

        fn process_response(&self, response: HttpResponse) -> Result<HttpResponse> {
            self.log.lock().unwrap().push(format!("response:{}", self.name));
            Ok(response)
        }

        fn handle_error(&self, error: Error) -> Error {
            self.log.lock().unwrap().push(format!("error:{}", self.name));
            error
        }
    }

    fn chain(log: &Arc<Mutex<Vec<String>>>) -> MiddlewareChain {
        MiddlewareChain::new()
            .add(Recorder { name: "a", log: Arc::clone(log) })
            .add(Recorder { name: "b", log: Arc::clone(log) })
    }

    #[tokio::test]
    async fn request_hooks_in_order_response_hooks_reversed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let transport = chain(&log).wrap(Echo);
        transport
            .execute(HttpRequest::get(Url::parse("http://example.com/").unwrap()))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["request:a", "request:b", "response:b", "response:a"]
        );
    }

    #[tokio::test]
    async fn errors_pass_through_error_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let transport = chain(&log).wrap(Failing);
        let err = transport
            .execute(HttpRequest::get(Url::parse("http://example.com/").unwrap()))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["request:a", "request:b", "error:b", "error:a"]
        );
    }

    #[tokio::test]
    async fn default_headers_fill_gaps_only() {
        let mut defaults = HeaderMap::new();
        defaults.insert(http::header::ACCEPT, HeaderValue::from_static("application/json"));
        defaults.insert(http::header::USER_AGENT, HeaderValue::from_static("default"));
        let transport = MiddlewareChain::new()
            .add(DefaultHeaders::new(defaults))
            .wrap(Echo);

        let request = HttpRequest::get(Url::parse("http://example.com/").unwrap())
            .header(http::header::USER_AGENT, HeaderValue::from_static("mine"));
        let response = transport.execute(request).await.unwrap();
        assert_eq!(response.headers()[http::header::ACCEPT], "application/json");
        assert_eq!(response.headers()[http::header::USER_AGENT], "mine");
    }
}

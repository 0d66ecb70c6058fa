//! HTTP request description handed to a [`Transport`](crate::transport::Transport)
//!
//! `HttpRequest` is a plain value: method, absolute URL, headers, an optional
//! body and per-request transport options. It is produced by the request
//! builder and consumed (by value) by a transport or by the caching layer.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::error::BoxError;
use crate::proxy::ProxyServer;

/// Stream of body chunks for a streamed request body
pub type BodyStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Request body representation
pub enum RequestBody {
    /// Fully buffered body
    InMemory(Bytes),
    /// Body produced incrementally; `content_length` is `None` for chunked transfer
    Streamed {
        stream: BodyStream,
        content_length: Option<u64>,
    },
}

impl RequestBody {
    /// Known length in bytes, if any
    #[must_use]
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            RequestBody::InMemory(bytes) => Some(bytes.len() as u64),
            RequestBody::Streamed { content_length, .. } => *content_length,
        }
    }

    /// Buffered bytes, `None` for streamed bodies
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::InMemory(bytes) => Some(bytes),
            RequestBody::Streamed { .. } => None,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::InMemory(bytes) => f
                .debug_tuple("InMemory")
                .field(&format!("{} bytes", bytes.len()))
                .finish(),
            RequestBody::Streamed { content_length, .. } => f
                .debug_struct("Streamed")
                .field("content_length", content_length)
                .finish_non_exhaustive(),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::InMemory(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::InMemory(Bytes::from(bytes))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::InMemory(Bytes::from(text))
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        RequestBody::InMemory(Bytes::from_static(text.as_bytes()))
    }
}

/// HTTP request description
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<RequestBody>,
    timeout: Option<Duration>,
    proxy: Option<ProxyServer>,
    /// `None` defers to the redirect policy of the transport
    follow_redirects: Option<bool>,
}

impl HttpRequest {
    /// Create a request with no headers and no body
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            proxy: None,
            follow_redirects: None,
        }
    }

    /// Shorthand for a `GET` request
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyServer> {
        self.proxy.as_ref()
    }

    #[must_use]
    pub fn follow_redirects(&self) -> Option<bool> {
        self.follow_redirects
    }

    /// Append a header value, keeping existing values for the same name
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace all headers
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyServer) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Override the transport's redirect policy for this request
    #[must_use]
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// Take the body out, leaving the request body-less
    pub fn take_body(&mut self) -> Option<RequestBody> {
        self.body.take()
    }

    /// First value of a header as text, if present and valid UTF-8
    #[must_use]
    pub fn header_str(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Copy of this request without its body
    #[must_use]
    pub fn without_body(&self) -> Self {
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: None,
            timeout: self.timeout,
            proxy: self.proxy.clone(),
            follow_redirects: self.follow_redirects,
        }
    }

    /// Full copy, or `None` when the body is a stream that can only be sent once
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        let body = match &self.body {
            None => None,
            Some(RequestBody::InMemory(bytes)) => Some(RequestBody::InMemory(bytes.clone())),
            Some(RequestBody::Streamed { .. }) => return None,
        };
        Some(Self {
            body,
            ..self.without_body()
        })
    }
}

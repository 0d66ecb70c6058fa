//! Core `RequestBuilder` structure and base functionality
//!
//! Contains the builder itself, the `ContentType` shorthand and the step
//! that turns accumulated settings into an [`HttpRequest`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cookie::Cookie;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST};
use http::{HeaderMap, HeaderValue, Method};
use revcache_client::error;
use revcache_client::proxy::ProxyServer;
use revcache_client::{Error, HttpRequest, RequestBody, Result, Transport};
use url::Url;

use super::auth::{self, AuthScheme};
use super::body::Body;
use super::cookies;
use super::query::{self, QueryParam};
use super::sign::RequestSigner;

/// Content type enumeration for common media types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// application/json content type
    ApplicationJson,
    /// application/x-www-form-urlencoded content type
    ApplicationFormUrlEncoded,
    /// application/octet-stream content type
    ApplicationOctetStream,
    /// text/plain content type
    TextPlain,
    /// text/html content type
    TextHtml,
}

impl ContentType {
    /// Convert content type to string representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::ApplicationJson => "application/json",
            ContentType::ApplicationFormUrlEncoded => "application/x-www-form-urlencoded",
            ContentType::ApplicationOctetStream => "application/octet-stream",
            ContentType::TextPlain => "text/plain",
            ContentType::TextHtml => "text/html",
        }
    }

    #[must_use]
    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

/// Builder for one request, executed by one of the verb methods
pub struct RequestBuilder {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) method: Method,
    /// Target without query string or user info
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<QueryParam>,
    pub(crate) cookies: Vec<Cookie<'static>>,
    pub(crate) auth: Option<AuthScheme>,
    pub(crate) body: Option<Body>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) virtual_host: Option<String>,
    pub(crate) proxy: Option<ProxyServer>,
    pub(crate) follow_redirects: Option<bool>,
    pub(crate) signer: Option<Arc<dyn RequestSigner>>,
    /// First invalid setting, reported when the request is built
    pub(crate) error: Option<Error>,
}

impl RequestBuilder {
    /// Start a `GET` request for `url` sent through `transport`
    ///
    /// # Errors
    ///
    /// Fails when `url` does not parse, carries an empty user info section
    /// or has a malformed query string.
    pub fn new(transport: Arc<dyn Transport>, url: &str) -> Result<Self> {
        let mut parsed = Url::parse(url).map_err(error::invalid_url)?;

        let auth = match auth::raw_user_info(url) {
            Some(user_info) => Some(AuthScheme::from_user_info(user_info).map_err(error::builder)?),
            None => None,
        };
        let query = match parsed.query() {
            Some(raw) => query::parse_query_string(raw).map_err(error::builder)?,
            None => Vec::new(),
        };

        parsed.set_query(None);
        parsed
            .set_username("")
            .and_then(|()| parsed.set_password(None))
            .map_err(|()| error::builder(format!("cannot strip user info from {url}")))?;

        tracing::debug!(
            target: "revcache::builder",
            url = %parsed,
            query_params = query.len(),
            user_info = auth.is_some(),
            "Starting request"
        );

        Ok(Self {
            transport,
            method: Method::GET,
            url: parsed,
            headers: HeaderMap::new(),
            query,
            cookies: Vec::new(),
            auth,
            body: None,
            timeout: None,
            virtual_host: None,
            proxy: None,
            follow_redirects: None,
            signer: None,
            error: None,
        })
    }

    /// Target URL, without query parameters or user info
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Set the method used by [`execute`](Self::execute)
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Per-request timeout enforced by the transport
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send `Host: host` instead of the URL's authority
    #[must_use]
    pub fn virtual_host(mut self, host: impl Into<String>) -> Self {
        self.virtual_host = Some(host.into());
        self
    }

    #[must_use]
    pub fn proxy_server(mut self, proxy: ProxyServer) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Follow or return redirects for this request, whatever the client default
    #[must_use]
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Remember the first failure; later ones are dropped
    pub(crate) fn fail(mut self, err: Error) -> Self {
        if self.error.is_none() {
            tracing::debug!(target: "revcache::builder", error = %err, "Invalid request setting");
            self.error = Some(err);
        }
        self
    }

    /// Assemble the request description
    ///
    /// With a body, exactly one `Content-Type` remains: the caller's if set,
    /// otherwise the body's. Form bodies drop any caller `Content-Length`; a
    /// streamed body takes its length from a caller `Content-Length` and is
    /// sent chunked without one. A signer set with
    /// [`sign`](Self::sign) runs last.
    ///
    /// # Errors
    ///
    /// Reports the first invalid setting made on this builder, or the
    /// signer's failure.
    pub fn build(self) -> Result<HttpRequest> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut url = self.url;
        query::apply(&mut url, &self.query);

        let mut headers = self.headers;
        if let Some(host) = self.virtual_host {
            let value = HeaderValue::from_str(&host).map_err(error::invalid_header)?;
            headers.insert(HOST, value);
        }
        if let Some(auth) = &self.auth {
            headers.insert(AUTHORIZATION, auth.header_value()?);
        }
        if let Some(value) = cookies::render(headers.get(COOKIE), &self.cookies)? {
            headers.insert(COOKIE, value);
        }

        let body = match self.body {
            None => None,
            Some(body) => {
                let content_type = headers
                    .get(CONTENT_TYPE)
                    .cloned()
                    .unwrap_or_else(|| body.content_type().clone());
                headers.insert(CONTENT_TYPE, content_type.clone());
                Some(match body {
                    Body::InMemory { data, .. } => {
                        if is_form(&content_type) {
                            headers.remove(CONTENT_LENGTH);
                        }
                        RequestBody::InMemory(data)
                    }
                    Body::Streamed { stream, .. } => {
                        let content_length = headers
                            .remove(CONTENT_LENGTH)
                            .map(|value| {
                                value
                                    .to_str()
                                    .ok()
                                    .and_then(|text| text.trim().parse::<u64>().ok())
                                    .ok_or_else(|| error::invalid_header("Content-Length is not a number"))
                            })
                            .transpose()?;
                        RequestBody::Streamed {
                            stream,
                            content_length,
                        }
                    }
                })
            }
        };

        let mut request = HttpRequest::new(self.method, url).with_headers(headers);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        if let Some(timeout) = self.timeout {
            request = request.with_timeout(timeout);
        }
        if let Some(proxy) = self.proxy {
            request = request.with_proxy(proxy);
        }
        if let Some(follow) = self.follow_redirects {
            request = request.with_follow_redirects(follow);
        }
        if let Some(signer) = &self.signer {
            signer.sign(&mut request)?;
        }
        Ok(request)
    }
}

fn is_form(content_type: &HeaderValue) -> bool {
    content_type
        .to_str()
        .ok()
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| {
            essence
                .trim()
                .eq_ignore_ascii_case(ContentType::ApplicationFormUrlEncoded.as_str())
        })
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("cookies", &self.cookies.len())
            .field("auth", &self.auth)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("virtual_host", &self.virtual_host)
            .field("proxy", &self.proxy)
            .field("follow_redirects", &self.follow_redirects)
            .field("signed", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

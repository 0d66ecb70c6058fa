//! Network transport on hyper's pooled client
//!
//! HTTP/1 and HTTP/2 over any hyper-util [`Connect`] implementation, plain
//! TCP through [`HttpConnector`] by default. Response bodies are collected
//! in full before the response is returned.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http::HeaderValue;
use http::header::{CONTENT_LENGTH, USER_AGENT};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use http_body::Frame;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::rt::TokioExecutor;
use url::Url;

use super::Transport;
use crate::error::{self, BoxError, Result};
use crate::http::{HttpRequest, HttpResponse, RequestBody};

/// Request body type handed to hyper
pub type TransportBody = UnsyncBoxBody<Bytes, BoxError>;

/// Network transport settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-exchange deadline when the request sets none
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Sent when the request carries no `User-Agent`
    pub user_agent: Option<String>,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub tcp_nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            user_agent: Some(concat!("revcache/", env!("CARGO_PKG_VERSION")).to_string()),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            tcp_nodelay: true,
        }
    }
}

/// [`Transport`] that talks to the network
#[derive(Debug, Clone)]
pub struct HyperTransport<C = HttpConnector> {
    client: Client<C, TransportBody>,
    config: TransportConfig,
}

impl Default for HyperTransport<HttpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport<HttpConnector> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(config.connect_timeout);
        connector.set_nodelay(config.tcp_nodelay);
        Self::with_connector(connector, config)
    }
}

impl<C> HyperTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    /// Use a custom connector, for example one that adds TLS
    #[must_use]
    pub fn with_connector(connector: C, config: TransportConfig) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);
        Self { client, config }
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn to_hyper(&self, mut request: HttpRequest) -> Result<http::Request<TransportBody>> {
        let uri = request
            .url()
            .as_str()
            .parse::<http::Uri>()
            .map_err(|e| error::builder(e).with_url(request.url().clone()))?;

        let mut headers = request.headers().clone();
        if !headers.contains_key(USER_AGENT)
            && let Some(agent) = self
                .config
                .user_agent
                .as_deref()
                .and_then(|agent| HeaderValue::from_str(agent).ok())
        {
            headers.insert(USER_AGENT, agent);
        }

        let body = match request.take_body() {
            None => full(Bytes::new()),
            Some(RequestBody::InMemory(bytes)) => full(bytes),
            Some(RequestBody::Streamed {
                stream,
                content_length,
            }) => {
                if let Some(length) = content_length
                    && !headers.contains_key(CONTENT_LENGTH)
                {
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
                }
                StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync()
            }
        };

        let mut hyper_request = http::Request::new(body);
        *hyper_request.method_mut() = request.method().clone();
        *hyper_request.uri_mut() = uri;
        *hyper_request.headers_mut() = headers;
        Ok(hyper_request)
    }

    async fn exchange(&self, request: http::Request<TransportBody>, url: &Url) -> Result<HttpResponse> {
        let response: http::Response<Incoming> = self.client.request(request).await.map_err(|e| {
            if e.is_connect() {
                error::connect(e).with_url(url.clone())
            } else {
                error::request(e).with_url(url.clone())
            }
        })?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| error::body(e).with_url(url.clone()))?
            .to_bytes();

        tracing::debug!(
            target: "revcache::transport",
            url = %url,
            status = parts.status.as_u16(),
            bytes = body.len(),
            "Exchange complete"
        );
        Ok(HttpResponse::new(parts.status, parts.headers, body).with_version(parts.version))
    }
}

fn full(bytes: Bytes) -> TransportBody {
    Full::new(bytes)
        .map_err(|never: Infallible| -> BoxError { match never {} })
        .boxed_unsync()
}

#[async_trait]
impl<C> Transport for HyperTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url().clone();
        if let Some(proxy) = request.proxy()
            && !proxy.bypasses(url.host_str().unwrap_or_default())
        {
            return Err(error::builder(format!(
                "request names proxy {}:{}; use a proxy-aware transport",
                proxy.host(),
                proxy.port()
            ))
            .with_url(url));
        }

        let timeout = request.timeout().or(self.config.timeout);
        tracing::debug!(
            target: "revcache::transport",
            method = %request.method(),
            url = %url,
            ?timeout,
            "Sending request"
        );
        let hyper_request = self.to_hyper(request)?;

        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(hyper_request, &url))
                .await
                .map_err(|_| {
                    error::timeout(format!("no response within {limit:?}")).with_url(url.clone())
                })?,
            None => self.exchange(hyper_request, &url).await,
        }
    }
}

//! Scripted transport and helpers shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CACHE_CONTROL, DATE, ETAG};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use revcache_client::cache::httpdate::fmt_http_date;
use revcache_client::prelude::*;

pub const START: u64 = 1_700_000_000;

/// Hands out queued responses in order and records every request it sees
#[derive(Default)]
pub struct Scripted {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    seen: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl Scripted {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delayed(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_err(&self, error: Error) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> HttpRequest {
        self.seen.lock().unwrap()[index].without_body()
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.seen.lock().unwrap().push(request.without_body());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected {} {}", request.method(), request.url()))
    }
}

pub fn clock() -> ManualClock {
    ManualClock::at_unix_secs(START)
}

pub fn url(path: &str) -> Url {
    Url::parse("http://example.com/").unwrap().join(path).unwrap()
}

pub fn get(path: &str) -> HttpRequest {
    HttpRequest::get(url(path))
}

pub fn request(method: Method, path: &str) -> HttpRequest {
    HttpRequest::new(method, url(path))
}

/// A 200 dated at the clock's current time
pub fn ok(clock: &ManualClock, body: &'static str, cache_control: &'static str) -> HttpResponse {
    HttpResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
        .with_header(DATE, date(clock))
        .with_header(CACHE_CONTROL, HeaderValue::from_static(cache_control))
}

pub fn with_etag(response: HttpResponse, etag: &'static str) -> HttpResponse {
    response.with_header(ETAG, HeaderValue::from_static(etag))
}

pub fn not_modified(clock: &ManualClock, etag: &'static str) -> HttpResponse {
    HttpResponse::empty(StatusCode::NOT_MODIFIED)
        .with_header(DATE, date(clock))
        .with_header(ETAG, HeaderValue::from_static(etag))
}

pub fn date(clock: &ManualClock) -> HeaderValue {
    HeaderValue::from_str(&fmt_http_date(clock.now())).unwrap()
}

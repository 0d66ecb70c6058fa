//! Stored responses and the data needed to reuse them
//!
//! A [`CacheEntry`] is an immutable snapshot of one request/response
//! exchange: the representation itself, the request headers it was selected
//! by, the times bracketing the exchange and the freshness lifetime fixed at
//! store time. Revalidation never edits an entry; it builds a replacement.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use http::header::{
    AGE, AUTHORIZATION, CONTENT_LENGTH, DATE, ETAG, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED, TRANSFER_ENCODING,
};
use http::{HeaderMap, HeaderValue, StatusCode, Version};
use thiserror::Error;

use super::cache_config::CacheConfig;
use super::cache_control::CacheControl;
use super::cache_key::{Vary, is_cacheable_method, vary_value};
use super::http_date::httpdate;
use crate::http::{HttpRequest, HttpResponse};

/// Why an exchange was not stored
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotCacheable {
    #[error("method {0} is not cacheable")]
    Method(String),
    #[error("status {0} is not cacheable without an explicit freshness directive")]
    Status(u16),
    #[error("no-store directive present")]
    NoStore,
    #[error("request carried Authorization and the response is not public")]
    Authorization,
    #[error("private response refused by a shared cache")]
    Private,
    #[error("response varies on `*`")]
    VaryStar,
    #[error("body of {size} bytes exceeds the {limit} byte entry limit")]
    TooLarge { size: usize, limit: usize },
}

/// Raw fields of an entry, as persisted by durable backends
#[derive(Debug, Clone)]
pub struct EntryParts {
    pub status: StatusCode,
    pub version: Version,
    pub response_headers: HeaderMap,
    pub body: Bytes,
    pub request_headers: HeaderMap,
    pub request_time: SystemTime,
    pub response_time: SystemTime,
    pub freshness_lifetime: Duration,
}

/// Cached response with everything needed to judge and revalidate it
#[derive(Debug, Clone)]
pub struct CacheEntry {
    parts: EntryParts,
    /// Directives of the stored response
    directives: CacheControl,
    vary: Vary,
    etag: Option<String>,
    last_modified: Option<String>,
    date: Option<SystemTime>,
    /// Value of the response `Age` header at receipt
    age_value: Duration,
}

impl CacheEntry {
    /// Classify a completed exchange and snapshot it if it may be stored
    ///
    /// `request_time` is taken just before the request was sent and
    /// `response_time` just after the full response arrived.
    pub fn from_exchange(
        request: &HttpRequest,
        response: &HttpResponse,
        request_time: SystemTime,
        response_time: SystemTime,
        config: &CacheConfig,
    ) -> Result<Self, NotCacheable> {
        if !is_cacheable_method(request.method()) {
            return Err(NotCacheable::Method(request.method().to_string()));
        }

        let request_cc = CacheControl::parse_request(request.headers());
        let response_cc = CacheControl::parse(response.headers());
        if request_cc.no_store || response_cc.no_store {
            return Err(NotCacheable::NoStore);
        }

        let status = response.status().as_u16();
        // Partial content and bare validations never describe a full representation
        if status == 206 || status == 304 {
            return Err(NotCacheable::Status(status));
        }
        if config.shared && response_cc.private {
            return Err(NotCacheable::Private);
        }
        if request.headers().contains_key(AUTHORIZATION)
            && !response_cc.public
            && response_cc.s_maxage.is_none()
        {
            return Err(NotCacheable::Authorization);
        }
        if !config.is_cacheable_status(status)
            && !response_cc.public
            && !has_explicit_freshness(&response_cc, response.headers(), config.shared)
        {
            return Err(NotCacheable::Status(status));
        }
        if Vary::parse(response.headers()) == Vary::Any {
            return Err(NotCacheable::VaryStar);
        }
        if response.body().len() > config.max_entry_bytes {
            return Err(NotCacheable::TooLarge {
                size: response.body().len(),
                limit: config.max_entry_bytes,
            });
        }

        Ok(Self::from_parts(EntryParts {
            status: response.status(),
            version: response.version(),
            response_headers: response.headers().clone(),
            body: response.body().clone(),
            request_headers: request.headers().clone(),
            request_time,
            response_time,
            freshness_lifetime: freshness_lifetime(response.headers(), response_time, config.shared),
        }))
    }

    /// Rebuild an entry from its raw fields
    ///
    /// Validators and age inputs are re-derived from the stored headers; the
    /// freshness lifetime is taken as given.
    #[must_use]
    pub fn from_parts(parts: EntryParts) -> Self {
        let headers = &parts.response_headers;
        let directives = CacheControl::parse(headers);
        let vary = Vary::parse(headers);
        let etag = header_string(headers, &ETAG);
        let last_modified = header_string(headers, &LAST_MODIFIED);
        let date = headers
            .get(DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| httpdate::parse_http_date(s).ok());
        let age_value = headers
            .get(AGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_default();

        Self {
            parts,
            directives,
            vary,
            etag,
            last_modified,
            date,
            age_value,
        }
    }

    #[must_use]
    pub fn parts(&self) -> &EntryParts {
        &self.parts
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.parts.version
    }

    #[must_use]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.parts.response_headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.parts.body
    }

    #[must_use]
    pub fn request_headers(&self) -> &HeaderMap {
        &self.parts.request_headers
    }

    #[must_use]
    pub fn request_time(&self) -> SystemTime {
        self.parts.request_time
    }

    #[must_use]
    pub fn response_time(&self) -> SystemTime {
        self.parts.response_time
    }

    #[must_use]
    pub fn freshness_lifetime(&self) -> Duration {
        self.parts.freshness_lifetime
    }

    #[must_use]
    pub fn directives(&self) -> &CacheControl {
        &self.directives
    }

    #[must_use]
    pub fn vary(&self) -> &Vary {
        &self.vary
    }

    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    #[must_use]
    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }

    #[must_use]
    pub fn date(&self) -> Option<SystemTime> {
        self.date
    }

    #[must_use]
    pub fn age_value(&self) -> Duration {
        self.age_value
    }

    /// An entry without `ETag` or `Last-Modified` can only be re-fetched
    #[must_use]
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    /// Estimated footprint for capacity accounting
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        let headers = |map: &HeaderMap| -> usize {
            map.iter()
                .map(|(name, value)| name.as_str().len() + value.len() + 4)
                .sum()
        };
        let total = self.parts.body.len()
            + headers(&self.parts.response_headers)
            + headers(&self.parts.request_headers);
        u64::try_from(total).unwrap_or(u64::MAX)
    }

    /// Current age per RFC 7234 §4.2.3
    #[must_use]
    pub fn current_age(&self, now: SystemTime) -> Duration {
        let apparent_age = self
            .date
            .and_then(|date| self.parts.response_time.duration_since(date).ok())
            .unwrap_or_default();
        let response_delay = self
            .parts
            .response_time
            .duration_since(self.parts.request_time)
            .unwrap_or_default();
        let corrected_initial_age = apparent_age.max(self.age_value) + response_delay;
        let resident_time = now
            .duration_since(self.parts.response_time)
            .unwrap_or_default();
        corrected_initial_age + resident_time
    }

    /// Whether a new request selects this entry under its `Vary` header
    #[must_use]
    pub fn matches_vary(&self, request_headers: &HeaderMap) -> bool {
        match &self.vary {
            Vary::None => true,
            Vary::Any => false,
            Vary::Headers(names) => names.iter().all(|name| {
                vary_value(&self.parts.request_headers, name) == vary_value(request_headers, name)
            }),
        }
    }

    /// Add `If-None-Match`/`If-Modified-Since` from the stored validators
    pub fn apply_validators(&self, headers: &mut HeaderMap) {
        if let Some(etag) = self.etag.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert(IF_NONE_MATCH, etag);
        }
        if let Some(modified) = self
            .last_modified
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(IF_MODIFIED_SINCE, modified);
        }
    }

    /// Whether a `304` describes a different representation than this entry
    ///
    /// Only a strong `ETag` on the `304` that differs from the stored one
    /// counts; a missing or weak tag is taken as confirmation.
    #[must_use]
    pub fn is_contradicted_by(&self, not_modified: &HttpResponse) -> bool {
        match (not_modified.etag(), self.etag.as_deref()) {
            (Some(new), Some(stored)) => is_strong(new) && new != stored,
            (Some(new), None) => is_strong(new),
            (None, _) => false,
        }
    }

    /// Replacement entry after a `304 Not Modified`
    ///
    /// Headers present on the `304` replace the stored ones, except
    /// framing headers which still describe the stored body. Status and
    /// body are kept and the freshness lifetime is recomputed.
    ///
    /// The stored `Date` and `Age` describe the old exchange: an undated
    /// `304` is dated at `response_time` and a stored `Age` is dropped
    /// unless the `304` sends its own.
    #[must_use]
    pub fn merge_not_modified(
        &self,
        not_modified: &HttpResponse,
        request_time: SystemTime,
        response_time: SystemTime,
        shared: bool,
    ) -> Self {
        let mut headers = self.parts.response_headers.clone();
        for name in not_modified.headers().keys() {
            if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
                continue;
            }
            headers.remove(name);
            for value in not_modified.headers().get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        if !not_modified.headers().contains_key(DATE)
            && let Ok(date) = HeaderValue::from_str(&httpdate::fmt_http_date(response_time))
        {
            headers.insert(DATE, date);
        }
        if !not_modified.headers().contains_key(AGE) {
            headers.remove(AGE);
        }

        let freshness_lifetime = freshness_lifetime(&headers, response_time, shared);
        Self::from_parts(EntryParts {
            status: self.parts.status,
            version: self.parts.version,
            response_headers: headers,
            body: self.parts.body.clone(),
            request_headers: self.parts.request_headers.clone(),
            request_time,
            response_time,
            freshness_lifetime,
        })
    }

    /// Response for the caller, with `Age` set to `age` in whole seconds
    #[must_use]
    pub fn to_response(&self, age: Duration) -> HttpResponse {
        let mut response = HttpResponse::from_cache_entry(self);
        response
            .headers_mut()
            .insert(AGE, HeaderValue::from(age.as_secs()));
        response
    }
}

/// Freshness lifetime of a response per RFC 7234 §4.2.1
///
/// `s-maxage` (shared caches only), then `max-age`, then `Expires` minus
/// `Date`. A malformed `max-age`/`s-maxage` or an unparseable `Expires`
/// yields zero, as does the absence of all three.
#[must_use]
pub fn freshness_lifetime(headers: &HeaderMap, response_time: SystemTime, shared: bool) -> Duration {
    let cc = CacheControl::parse(headers);
    if shared {
        if cc.has_malformed("s-maxage") {
            return Duration::ZERO;
        }
        if let Some(s_maxage) = cc.s_maxage {
            return s_maxage;
        }
    }
    if cc.has_malformed("max-age") {
        return Duration::ZERO;
    }
    if let Some(max_age) = cc.max_age {
        return max_age;
    }

    let Some(expires) = headers.get(EXPIRES).and_then(|v| v.to_str().ok()) else {
        return Duration::ZERO;
    };
    let Ok(expires) = httpdate::parse_http_date(expires) else {
        return Duration::ZERO;
    };
    let date = headers
        .get(DATE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| httpdate::parse_http_date(s).ok())
        .unwrap_or(response_time);
    expires.duration_since(date).unwrap_or_default()
}

fn has_explicit_freshness(cc: &CacheControl, headers: &HeaderMap, shared: bool) -> bool {
    cc.max_age.is_some() || (shared && cc.s_maxage.is_some()) || headers.contains_key(EXPIRES)
}

fn header_string(headers: &HeaderMap, name: &http::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

fn is_strong(etag: &str) -> bool {
    !etag.trim_start().starts_with("W/")
}

//! Cache key derivation
//!
//! A [`CacheKey`] is the request method plus the normalized effective URI,
//! optionally extended with the request's values for the header names a
//! stored response listed in `Vary`. Without `Vary`, method and URI alone are
//! the identity.

use std::fmt;

use http::{HeaderMap, HeaderName, Method};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::HttpRequest;

/// Identity used for cache lookup and invalidation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Request method, upper case
    method: String,
    /// Normalized effective request URI
    uri: String,
    /// Request values for the nominated `Vary` headers, sorted by header name
    vary: Vec<(String, Option<String>)>,
}

/// The `Vary` header of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vary {
    /// No `Vary` header
    None,
    /// `Vary: *`, which no later request can match
    Any,
    /// Nominated request header names, lower case, sorted and de-duplicated
    Headers(Vec<HeaderName>),
}

impl Vary {
    #[must_use]
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut names = Vec::new();
        for value in headers.get_all(http::header::VARY) {
            let Ok(value) = value.to_str() else { continue };
            for token in value.split(',') {
                let token = token.trim();
                if token == "*" {
                    return Vary::Any;
                }
                if let Ok(name) = HeaderName::from_bytes(token.as_bytes()) {
                    names.push(name);
                }
            }
        }
        if names.is_empty() {
            return Vary::None;
        }
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        names.dedup();
        Vary::Headers(names)
    }

    #[must_use]
    pub fn names(&self) -> &[HeaderName] {
        match self {
            Vary::Headers(names) => names,
            Vary::None | Vary::Any => &[],
        }
    }
}

impl CacheKey {
    /// Base key for a method and URL, without a `Vary` dimension
    #[must_use]
    pub fn new(method: &Method, url: &Url) -> Self {
        Self {
            method: method.as_str().to_ascii_uppercase(),
            uri: normalize_uri(url),
            vary: Vec::new(),
        }
    }

    /// Lookup key for a request, `None` for methods the cache never serves
    #[must_use]
    pub fn for_request(request: &HttpRequest) -> Option<Self> {
        is_cacheable_method(request.method()).then(|| Self::new(request.method(), request.url()))
    }

    /// Extend this key with the request's values for the nominated headers
    #[must_use]
    pub fn with_vary(&self, names: &[HeaderName], request_headers: &HeaderMap) -> Self {
        let mut vary: Vec<(String, Option<String>)> = names
            .iter()
            .map(|name| (name.as_str().to_string(), vary_value(request_headers, name)))
            .collect();
        vary.sort();
        vary.dedup();
        Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            vary,
        }
    }

    /// This key without its `Vary` dimension
    #[must_use]
    pub fn base(&self) -> Self {
        Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            vary: Vec::new(),
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn vary_values(&self) -> &[(String, Option<String>)] {
        &self.vary
    }

    #[must_use]
    pub fn is_variant(&self) -> bool {
        !self.vary.is_empty()
    }

    /// Whether this key refers to the resource at `url`, in any method or variant
    #[must_use]
    pub fn targets(&self, url: &Url) -> bool {
        self.uri == normalize_uri(url)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)?;
        for (name, value) in &self.vary {
            write!(f, " [{name}={}]", value.as_deref().unwrap_or("<absent>"))?;
        }
        Ok(())
    }
}

/// Methods whose responses may be served from cache
#[must_use]
pub fn is_cacheable_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Normalize an effective request URI for use as a key
///
/// Scheme and host are already lower-cased by `url`, default ports dropped
/// and an empty path becomes `/`. On top of that the fragment and an empty
/// query are removed and percent-escapes are upper-cased.
#[must_use]
pub fn normalize_uri(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    if url.query() == Some("") {
        url.set_query(None);
    }
    uppercase_escapes(url.as_str())
}

/// Canonical form of a request's header value for `Vary` matching
///
/// Multiple field lines are joined with `", "` and whitespace runs collapse.
#[must_use]
pub fn vary_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(name)
        .iter()
        .map(|value| {
            String::from_utf8_lossy(value.as_bytes())
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

fn uppercase_escapes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push('%');
            out.push(char::from(bytes[i + 1].to_ascii_uppercase()));
            out.push(char::from(bytes[i + 2].to_ascii_uppercase()));
            i += 3;
        } else {
            out.push(char::from(bytes[i]));
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn key(url: &str) -> CacheKey {
        CacheKey::new(&Method::GET, &Url::parse(url).unwrap())
    }

    #[test]
    fn semantically_identical_uris_collide() {
        let a = key("HTTP://Example.COM:80/path?q=1#frag");
        let b = key("http://example.com/path?q=1");
        assert_eq!(a, b);
        assert_eq!(key("http://example.com"), key("http://example.com/"));
        assert_eq!(key("https://example.com:443/x"), key("https://example.com/x"));
        assert_eq!(key("http://example.com/a%2fb"), key("http://example.com/a%2Fb"));
        assert_eq!(key("http://example.com/a?"), key("http://example.com/a"));
    }

    #[test]
    fn different_resources_do_not_collide() {
        assert_ne!(key("http://example.com/a"), key("http://example.com/b"));
        assert_ne!(key("http://example.com/a?x=1"), key("http://example.com/a?x=2"));
        assert_ne!(key("http://example.com:8080/a"), key("http://example.com/a"));
        assert_ne!(
            key("http://example.com/a"),
            CacheKey::new(&Method::HEAD, &Url::parse("http://example.com/a").unwrap())
        );
    }

    #[test]
    fn only_get_and_head_produce_lookup_keys() {
        let url = Url::parse("http://example.com/").unwrap();
        assert!(CacheKey::for_request(&HttpRequest::get(url.clone())).is_some());
        assert!(CacheKey::for_request(&HttpRequest::new(Method::HEAD, url.clone())).is_some());
        assert!(CacheKey::for_request(&HttpRequest::new(Method::POST, url.clone())).is_none());
        assert!(CacheKey::for_request(&HttpRequest::new(Method::OPTIONS, url)).is_none());
    }

    #[test]
    fn vary_values_distinguish_variants() {
        let base = key("http://example.com/");
        let names = [http::header::ACCEPT_LANGUAGE];

        let mut en = HeaderMap::new();
        en.insert(http::header::ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
        let mut de = HeaderMap::new();
        de.insert(http::header::ACCEPT_LANGUAGE, HeaderValue::from_static("de"));

        let en_key = base.with_vary(&names, &en);
        let de_key = base.with_vary(&names, &de);
        assert_ne!(en_key, de_key);
        assert_ne!(en_key, base);
        assert_eq!(en_key.base(), base);
        assert!(en_key.is_variant());
        assert_eq!(en_key, base.with_vary(&names, &en));
    }

    #[test]
    fn absent_header_differs_from_empty() {
        let base = key("http://example.com/");
        let names = [http::header::ACCEPT];
        let mut empty = HeaderMap::new();
        empty.insert(http::header::ACCEPT, HeaderValue::from_static(""));
        assert_ne!(base.with_vary(&names, &HeaderMap::new()), base.with_vary(&names, &empty));
    }

    #[test]
    fn vary_whitespace_is_normalized() {
        let mut a = HeaderMap::new();
        a.insert(http::header::ACCEPT, HeaderValue::from_static("text/html,  application/json"));
        let mut b = HeaderMap::new();
        b.insert(http::header::ACCEPT, HeaderValue::from_static("text/html, application/json"));
        assert_eq!(
            vary_value(&a, &http::header::ACCEPT),
            vary_value(&b, &http::header::ACCEPT)
        );
    }

    #[test]
    fn vary_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(Vary::parse(&headers), Vary::None);

        headers.insert(http::header::VARY, HeaderValue::from_static("Accept-Language, accept"));
        assert_eq!(
            Vary::parse(&headers),
            Vary::Headers(vec![http::header::ACCEPT, http::header::ACCEPT_LANGUAGE])
        );

        headers.append(http::header::VARY, HeaderValue::from_static("*"));
        assert_eq!(Vary::parse(&headers), Vary::Any);
    }

    #[test]
    fn targets_ignores_method_and_variant() {
        let url = Url::parse("http://example.com/r").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("x"));
        let variant = key("http://example.com/r").with_vary(&[http::header::ACCEPT], &headers);
        assert!(variant.targets(&url));
        assert!(!key("http://example.com/other").targets(&url));
    }
}

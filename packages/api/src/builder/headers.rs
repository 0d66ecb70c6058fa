//! Header management and manipulation functionality
//!
//! Header names are case-insensitive and a name may carry several values.
//! `add_header` appends, the `set_*` methods replace.

use http::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use revcache_client::error;

use crate::builder::core::{ContentType, RequestBuilder};

/// A media type given either as a known [`ContentType`] or as text
#[derive(Debug, Clone)]
pub enum MediaType {
    /// String representation of a media type
    String(String),
    /// ContentType enum variant
    ContentType(ContentType),
}

impl MediaType {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            MediaType::String(s) => s,
            MediaType::ContentType(ct) => ct.as_str(),
        }
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        MediaType::String(s.to_string())
    }
}

impl From<String> for MediaType {
    fn from(s: String) -> Self {
        MediaType::String(s)
    }
}

impl From<ContentType> for MediaType {
    fn from(ct: ContentType) -> Self {
        MediaType::ContentType(ct)
    }
}

impl RequestBuilder {
    /// Append a header value, keeping earlier values for the same name
    ///
    /// An invalid name or value is reported when the request is built.
    #[must_use]
    pub fn add_header(self, name: &str, value: &str) -> Self {
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(err) => return self.fail(error::invalid_header(err)),
        };
        match HeaderValue::from_str(value) {
            Ok(value) => self.header(name, value),
            Err(err) => self.fail(error::invalid_header(err)),
        }
    }

    /// Append an already validated header value
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace every value of `name` with `value`
    #[must_use]
    pub fn set_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace all headers
    #[must_use]
    pub fn set_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set the `Content-Type`, overriding the one a body implies
    #[must_use]
    pub fn content_type<T: Into<MediaType>>(self, content_type: T) -> Self {
        self.set_text_header(CONTENT_TYPE, content_type.into().as_str())
    }

    /// Set Accept header - supports both string and ContentType enum
    ///
    /// # Examples
    /// ```no_run
    /// use revcache::{Client, ContentType, HyperTransport};
    ///
    /// # fn run() -> revcache::Result<()> {
    /// let client = Client::new(HyperTransport::new());
    /// let by_name = client.url("https://api.example.com/data")?.accept("application/json");
    /// let by_enum = client.url("https://api.example.com/data")?.accept(ContentType::ApplicationJson);
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn accept<T: Into<MediaType>>(self, accept: T) -> Self {
        self.set_text_header(ACCEPT, accept.into().as_str())
    }

    #[must_use]
    pub fn user_agent(self, user_agent: &str) -> Self {
        self.set_text_header(USER_AGENT, user_agent)
    }

    /// Set request cache directives (e.g. `"no-cache"`, `"max-stale=30"`)
    #[must_use]
    pub fn cache_control(self, value: &str) -> Self {
        self.set_text_header(CACHE_CONTROL, value)
    }

    /// Accept cached responses no older than `seconds`
    #[must_use]
    pub fn max_age(self, seconds: u64) -> Self {
        self.cache_control(&format!("max-age={seconds}"))
    }

    /// Answer only from the cache; a miss yields `504 Gateway Timeout`
    #[must_use]
    pub fn only_if_cached(self) -> Self {
        self.cache_control("only-if-cached")
    }

    /// Force revalidation of any cached response
    #[must_use]
    pub fn no_cache(self) -> Self {
        self.cache_control("no-cache")
    }

    fn set_text_header(self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => self.set_header(name, value),
            Err(err) => self.fail(error::invalid_header(err)),
        }
    }
}

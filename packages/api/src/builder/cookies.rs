//! Request cookies, rendered into a single `Cookie` header

use cookie::Cookie;
use http::HeaderValue;
use revcache_client::{Result, error};

use crate::builder::core::RequestBuilder;

/// Join `cookies` after any `existing` header value
///
/// Only name and value are sent; attributes such as `Path` belong to
/// `Set-Cookie` and are stripped.
pub(crate) fn render(existing: Option<&HeaderValue>, cookies: &[Cookie<'static>]) -> Result<Option<HeaderValue>> {
    if cookies.is_empty() {
        return Ok(None);
    }
    let mut parts: Vec<String> = Vec::with_capacity(cookies.len() + 1);
    if let Some(existing) = existing {
        let existing = existing.to_str().map_err(error::invalid_header)?;
        if !existing.trim().is_empty() {
            parts.push(existing.trim().to_string());
        }
    }
    parts.extend(cookies.iter().map(|cookie| cookie.stripped().to_string()));
    HeaderValue::from_str(&parts.join("; "))
        .map(Some)
        .map_err(error::invalid_header)
}

impl RequestBuilder {
    /// Add a cookie by name and value
    #[must_use]
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies
            .push(Cookie::new(name.to_string(), value.to_string()));
        self
    }

    /// Add a prepared cookie; only its name and value are sent
    #[must_use]
    pub fn add_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    #[must_use]
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }
}

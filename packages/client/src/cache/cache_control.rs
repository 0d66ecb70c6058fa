//! `Cache-Control` directive parsing
//!
//! All `Cache-Control` field lines are folded into one [`CacheControl`].
//! Parsing never fails: a directive whose argument cannot be read is skipped
//! and the set is flagged as malformed, leaving callers to apply their
//! conservative default.

use std::time::Duration;

use http::HeaderMap;
use http::header::{CACHE_CONTROL, PRAGMA};

/// Parsed `Cache-Control` directives from either a request or a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub no_store: bool,
    pub no_cache: bool,
    pub private: bool,
    pub public: bool,
    pub must_revalidate: bool,
    pub proxy_revalidate: bool,
    pub only_if_cached: bool,
    pub max_age: Option<Duration>,
    pub s_maxage: Option<Duration>,
    /// `Some(None)` is a bare `max-stale`: any staleness is acceptable
    pub max_stale: Option<Option<Duration>>,
    pub min_fresh: Option<Duration>,
    malformed: Vec<String>,
}

impl CacheControl {
    /// Parse every `Cache-Control` header in `headers`
    #[must_use]
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut cc = CacheControl::default();
        let mut seen: Vec<String> = Vec::new();

        for value in headers.get_all(CACHE_CONTROL) {
            let Ok(value) = value.to_str() else {
                cc.malformed.push("<non-ascii cache-control>".to_string());
                continue;
            };
            for directive in split_directives(value) {
                let (name, arg) = match directive.split_once('=') {
                    Some((name, arg)) => (name.trim().to_ascii_lowercase(), Some(unquote(arg.trim()))),
                    None => (directive.trim().to_ascii_lowercase(), None),
                };
                if name.is_empty() {
                    continue;
                }
                // First occurrence wins for repeated directives
                if seen.contains(&name) {
                    continue;
                }
                seen.push(name.clone());
                cc.apply(&name, arg.as_deref(), directive);
            }
        }

        cc
    }

    /// Parse request directives; `Pragma: no-cache` counts as `no-cache`
    #[must_use]
    pub fn parse_request(headers: &HeaderMap) -> Self {
        let mut cc = Self::parse(headers);
        if pragma_no_cache(headers) {
            cc.no_cache = true;
        }
        cc
    }

    fn apply(&mut self, name: &str, arg: Option<&str>, raw: &str) {
        match name {
            "no-store" => self.no_store = true,
            // The field-name list form (`no-cache="Set-Cookie"`) is treated as unqualified
            "no-cache" => self.no_cache = true,
            "private" => self.private = true,
            "public" => self.public = true,
            "must-revalidate" => self.must_revalidate = true,
            "proxy-revalidate" => self.proxy_revalidate = true,
            "only-if-cached" => self.only_if_cached = true,
            "max-age" => self.max_age = self.seconds(arg, raw),
            "s-maxage" => self.s_maxage = self.seconds(arg, raw),
            "min-fresh" => self.min_fresh = self.seconds(arg, raw),
            "max-stale" => {
                self.max_stale = match arg {
                    None => Some(None),
                    Some(_) => self.seconds(arg, raw).map(Some),
                }
            }
            _ => {}
        }
    }

    fn seconds(&mut self, arg: Option<&str>, raw: &str) -> Option<Duration> {
        match arg.map(parse_delta_seconds) {
            Some(Some(duration)) => Some(duration),
            _ => {
                tracing::debug!(
                    target: "revcache::cache",
                    directive = raw,
                    "Ignoring malformed Cache-Control directive"
                );
                self.malformed.push(raw.trim().to_string());
                None
            }
        }
    }

    /// Directives that were present but could not be parsed
    #[must_use]
    pub fn malformed(&self) -> &[String] {
        &self.malformed
    }

    #[must_use]
    pub fn is_malformed(&self) -> bool {
        !self.malformed.is_empty()
    }

    /// Whether a malformed `max-age` (or similar) was seen for `directive`
    #[must_use]
    pub fn has_malformed(&self, directive: &str) -> bool {
        self.malformed.iter().any(|raw| {
            raw.split('=')
                .next()
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(directive))
        })
    }
}

/// `Pragma: no-cache`, the HTTP/1.0 request directive
#[must_use]
pub fn pragma_no_cache(headers: &HeaderMap) -> bool {
    headers
        .get_all(PRAGMA)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("no-cache"))
}

/// delta-seconds per RFC 7234 §1.2.1; values beyond `u32::MAX` saturate
fn parse_delta_seconds(arg: &str) -> Option<Duration> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs = arg.parse::<u64>().unwrap_or(u64::from(u32::MAX));
    Some(Duration::from_secs(secs.min(u64::from(u32::MAX))))
}

/// Split on commas that are outside quoted strings
fn split_directives(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn unquote(arg: &str) -> String {
    arg.strip_prefix('"')
        .and_then(|a| a.strip_suffix('"'))
        .unwrap_or(arg)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(values: &[&'static str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for value in values {
            map.append(CACHE_CONTROL, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn folds_multiple_field_lines() {
        let cc = CacheControl::parse(&headers(&["public, max-age=60", "must-revalidate"]));
        assert!(cc.public);
        assert!(cc.must_revalidate);
        assert_eq!(cc.max_age, Some(Duration::from_secs(60)));
        assert!(!cc.is_malformed());
    }

    #[test]
    fn names_are_case_insensitive_and_arguments_unquoted() {
        let cc = CacheControl::parse(&headers(&["Max-Age=\"30\", NO-STORE"]));
        assert_eq!(cc.max_age, Some(Duration::from_secs(30)));
        assert!(cc.no_store);
    }

    #[test]
    fn malformed_argument_is_ignored_and_flagged() {
        let cc = CacheControl::parse(&headers(&["max-age=soon, public"]));
        assert_eq!(cc.max_age, None);
        assert!(cc.public);
        assert!(cc.has_malformed("max-age"));
    }

    #[test]
    fn first_occurrence_wins() {
        let cc = CacheControl::parse(&headers(&["max-age=10, max-age=99"]));
        assert_eq!(cc.max_age, Some(Duration::from_secs(10)));
    }

    #[test]
    fn quoted_commas_do_not_split() {
        let cc = CacheControl::parse(&headers(&["no-cache=\"set-cookie, x-foo\", max-age=5"]));
        assert!(cc.no_cache);
        assert_eq!(cc.max_age, Some(Duration::from_secs(5)));
    }

    #[test]
    fn max_stale_with_and_without_value() {
        assert_eq!(CacheControl::parse(&headers(&["max-stale"])).max_stale, Some(None));
        assert_eq!(
            CacheControl::parse(&headers(&["max-stale=20"])).max_stale,
            Some(Some(Duration::from_secs(20)))
        );
    }

    #[test]
    fn request_pragma_no_cache_is_folded_in() {
        let mut map = HeaderMap::new();
        map.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        assert!(CacheControl::parse_request(&map).no_cache);
        assert!(!CacheControl::parse(&map).no_cache);

        map.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        let cc = CacheControl::parse_request(&map);
        assert!(cc.no_cache);
        assert_eq!(cc.max_age, Some(Duration::from_secs(60)));
    }

    #[test]
    fn huge_delta_saturates() {
        let cc = CacheControl::parse(&headers(&["max-age=99999999999999999999"]));
        assert_eq!(cc.max_age, Some(Duration::from_secs(u64::from(u32::MAX))));
    }
}

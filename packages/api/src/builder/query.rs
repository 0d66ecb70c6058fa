//! Ordered query parameters

use serde::Serialize;
use url::Url;
use url::form_urlencoded;

use crate::builder::core::RequestBuilder;

/// A query parameter; `None` renders as a bare name
pub type QueryParam = (String, Option<String>);

/// A query string part that is not `name`, `name=value` or empty
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryStringError {
    #[error("query string part {0:?} has more than one '='")]
    TooManyEquals(String),
    #[error("query string part {0:?} starts with '='")]
    MissingName(String),
}

/// Split a raw query string into ordered, decoded parameters
pub fn parse_query_string(raw: &str) -> Result<Vec<QueryParam>, QueryStringError> {
    let mut params = Vec::new();
    for part in raw.split('&').filter(|part| !part.is_empty()) {
        if part.starts_with('=') {
            return Err(QueryStringError::MissingName(part.to_string()));
        }
        if part.matches('=').count() > 1 {
            return Err(QueryStringError::TooManyEquals(part.to_string()));
        }
        let value = part.contains('=');
        let Some((name, decoded)) = form_urlencoded::parse(part.as_bytes()).next() else {
            continue;
        };
        params.push((name.into_owned(), value.then(|| decoded.into_owned())));
    }
    Ok(params)
}

/// Replace the query of `url` with `params`, in order
pub(crate) fn apply(url: &mut Url, params: &[QueryParam]) {
    if params.is_empty() {
        url.set_query(None);
        return;
    }
    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (name, value) in params {
        match value {
            Some(value) => pairs.append_pair(name, value),
            None => pairs.append_key_only(name),
        };
    }
}

impl RequestBuilder {
    /// Append a query parameter; earlier ones with the same name are kept
    #[must_use]
    pub fn query_param(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), Some(value.to_string())));
        self
    }

    /// Append a parameter rendered without `=`
    #[must_use]
    pub fn query_flag(mut self, name: &str) -> Self {
        self.query.push((name.to_string(), None));
        self
    }

    /// Append every field of `params` as a query parameter
    #[must_use]
    pub fn query<T: Serialize + ?Sized>(mut self, params: &T) -> Self {
        match serde_urlencoded::to_string(params) {
            Ok(encoded) => {
                self.query.extend(
                    form_urlencoded::parse(encoded.as_bytes())
                        .map(|(name, value)| (name.into_owned(), Some(value.into_owned()))),
                );
                self
            }
            Err(err) => self.fail(revcache_client::error::builder(err)),
        }
    }

    /// Replace all query parameters
    #[must_use]
    pub fn set_query_params(mut self, params: Vec<QueryParam>) -> Self {
        self.query = params;
        self
    }

    #[must_use]
    pub fn query_params(&self) -> &[QueryParam] {
        &self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, value: Option<&str>) -> QueryParam {
        (name.to_string(), value.map(str::to_string))
    }

    #[test]
    fn parses_pairs_and_bare_names_in_order() {
        let params = parse_query_string("b=2&a&c=x%20y&&a=1").unwrap();
        assert_eq!(
            params,
            vec![
                param("b", Some("2")),
                param("a", None),
                param("c", Some("x y")),
                param("a", Some("1")),
            ]
        );
    }

    #[test]
    fn rejects_malformed_parts() {
        assert_eq!(
            parse_query_string("a=b=c"),
            Err(QueryStringError::TooManyEquals("a=b=c".into()))
        );
        assert_eq!(
            parse_query_string("ok=1&=x"),
            Err(QueryStringError::MissingName("=x".into()))
        );
    }

    #[test]
    fn apply_renders_bare_names() {
        let mut url = Url::parse("http://example.com/p").unwrap();
        apply(&mut url, &[param("q", Some("a b")), param("flag", None)]);
        assert_eq!(url.as_str(), "http://example.com/p?q=a+b&flag");
    }
}

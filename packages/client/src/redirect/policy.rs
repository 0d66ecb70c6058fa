//! Redirect policies

use std::fmt;

use http::StatusCode;
use url::Url;

use super::attempt::{Action, ActionKind, Attempt};

const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Decides whether each redirect in a chain is followed
pub struct Policy {
    inner: PolicyKind,
}

enum PolicyKind {
    Custom(Box<dyn Fn(Attempt) -> Action + Send + Sync + 'static>),
    Limit(usize),
    None,
}

impl Policy {
    /// Follow at most `max` redirects, then fail
    #[must_use]
    pub fn limited(max: usize) -> Self {
        Self {
            inner: PolicyKind::Limit(max),
        }
    }

    /// Never follow; redirect responses reach the caller as they are
    #[must_use]
    pub fn none() -> Self {
        Self {
            inner: PolicyKind::None,
        }
    }

    /// Decide every hop with `policy`
    ///
    /// ```rust
    /// use revcache_client::redirect::Policy;
    ///
    /// let policy = Policy::custom(|attempt| {
    ///     if attempt.url().host_str() == Some("example.com") {
    ///         attempt.follow()
    ///     } else {
    ///         attempt.stop()
    ///     }
    /// });
    /// # drop(policy);
    /// ```
    pub fn custom<F>(policy: F) -> Self
    where
        F: Fn(Attempt) -> Action + Send + Sync + 'static,
    {
        Self {
            inner: PolicyKind::Custom(Box::new(policy)),
        }
    }

    pub(crate) fn check(&self, status: StatusCode, next: &Url, previous: &[Url]) -> ActionKind {
        // a URL seen earlier in this chain can only lead back here
        if previous.contains(next) {
            return ActionKind::Error(format!("redirect loop at {next}").into());
        }
        match &self.inner {
            PolicyKind::Custom(policy) => {
                policy(Attempt {
                    status,
                    next,
                    previous,
                })
                .inner
            }
            PolicyKind::Limit(max) => {
                if previous.len() > *max {
                    ActionKind::Error(format!("too many redirects (limit {max})").into())
                } else {
                    ActionKind::Follow
                }
            }
            PolicyKind::None => ActionKind::Stop,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::limited(DEFAULT_MAX_REDIRECTS)
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            PolicyKind::Custom(..) => f.pad("Custom"),
            PolicyKind::Limit(max) => f.debug_tuple("Limit").field(max).finish(),
            PolicyKind::None => f.pad("None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("http://example.com/").unwrap().join(path).unwrap()
    }

    #[test]
    fn limit_counts_hops() {
        let policy = Policy::limited(2);
        let next = url("/next");
        assert!(matches!(
            policy.check(StatusCode::FOUND, &next, &[url("/a"), url("/b")]),
            ActionKind::Follow
        ));
        assert!(matches!(
            policy.check(StatusCode::FOUND, &next, &[url("/a"), url("/b"), url("/c")]),
            ActionKind::Error(_)
        ));
    }

    #[test]
    fn loops_are_errors_under_any_policy() {
        let previous = [url("/a"), url("/b")];
        assert!(matches!(
            Policy::default().check(StatusCode::FOUND, &url("/a"), &previous),
            ActionKind::Error(_)
        ));
        assert!(matches!(
            Policy::none().check(StatusCode::FOUND, &url("/a"), &previous),
            ActionKind::Error(_)
        ));
    }

    #[test]
    fn custom_policy_sees_the_attempt() {
        let policy = Policy::custom(|attempt| {
            if attempt.status() == StatusCode::MOVED_PERMANENTLY {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });
        let previous = [url("/a")];
        assert!(matches!(
            policy.check(StatusCode::MOVED_PERMANENTLY, &url("/b"), &previous),
            ActionKind::Follow
        ));
        assert!(matches!(
            policy.check(StatusCode::FOUND, &url("/b"), &previous),
            ActionKind::Stop
        ));
    }
}

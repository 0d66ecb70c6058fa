//! The redirect-following transport

use std::sync::Arc;

use async_trait::async_trait;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, REFERER, TRANSFER_ENCODING};
use http::{Method, StatusCode};
use url::Url;

use super::attempt::ActionKind;
use super::headers::{make_referer, remove_sensitive_headers};
use super::policy::Policy;
use crate::error::{self, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// A [`Transport`] that follows redirects answered by the transport it wraps
pub struct FollowRedirects<T> {
    inner: T,
    policy: Arc<Policy>,
    follow_by_default: bool,
    referer: bool,
}

impl<T> std::fmt::Debug for FollowRedirects<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowRedirects")
            .field("policy", &self.policy)
            .field("follow_by_default", &self.follow_by_default)
            .field("referer", &self.referer)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> FollowRedirects<T> {
    /// Follow redirects under the default policy, sending `Referer`
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            policy: Arc::new(Policy::default()),
            follow_by_default: true,
            referer: true,
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Whether requests that do not say otherwise are followed
    #[must_use]
    pub fn follow_by_default(mut self, follow: bool) -> Self {
        self.follow_by_default = follow;
        self
    }

    #[must_use]
    pub fn referer(mut self, enabled: bool) -> Self {
        self.referer = enabled;
        self
    }

    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn next_request(
        &self,
        status: StatusCode,
        template: HttpRequest,
        replay: Option<HttpRequest>,
        next: &Url,
        previous: &[Url],
    ) -> Option<HttpRequest> {
        let switch_to_get = status == StatusCode::SEE_OTHER
            || (matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND)
                && template.method() == Method::POST);

        let mut request = if switch_to_get {
            let mut request = template;
            if request.method() != Method::HEAD {
                request.set_method(Method::GET);
            }
            for name in [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_ENCODING, TRANSFER_ENCODING] {
                request.headers_mut().remove(name);
            }
            request
        } else {
            // 307/308 resend the body; a one-shot stream cannot be resent
            replay?
        };

        request.set_url(next.clone());
        remove_sensitive_headers(request.headers_mut(), next, previous);
        if self.referer
            && let Some(referer) = previous.last().and_then(|from| make_referer(next, from))
        {
            request.headers_mut().insert(REFERER, referer);
        }
        Some(request)
    }
}

/// Where a redirect response points, resolved against the request URL
fn redirect_target(response: &HttpResponse, current: &Url) -> Option<Result<Url>> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }
    let location = response.header_str(LOCATION)?;
    Some(
        current
            .join(location)
            .map_err(|err| error::redirect(err, current.clone())),
    )
}

#[async_trait]
impl<T: Transport> Transport for FollowRedirects<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if !request.follow_redirects().unwrap_or(self.follow_by_default) {
            return self.inner.execute(request).await;
        }

        let mut previous: Vec<Url> = Vec::new();
        let mut request = request;
        loop {
            let current = request.url().clone();
            let template = request.without_body();
            let replay = request.try_clone();
            let response = self.inner.execute(request).await?;

            let next = match redirect_target(&response, &current) {
                None => return Ok(response),
                Some(next) => next?,
            };
            previous.push(current.clone());

            match self.policy.check(response.status(), &next, &previous) {
                ActionKind::Follow => {}
                ActionKind::Stop => return Ok(response),
                ActionKind::Error(err) => return Err(error::redirect(err, current)),
            }
            if next.scheme() != "http" && next.scheme() != "https" {
                return Err(error::redirect(format!("unsupported redirect scheme in {next}"), current));
            }

            let Some(next_request) =
                self.next_request(response.status(), template, replay, &next, &previous)
            else {
                tracing::debug!(
                    target: "revcache::redirect",
                    from = %current,
                    to = %next,
                    "Streamed body cannot be resent, returning redirect"
                );
                return Ok(response);
            };
            tracing::debug!(
                target: "revcache::redirect",
                status = response.status().as_u16(),
                from = %current,
                to = %next,
                "Following redirect"
            );
            request = next_request;
        }
    }
}

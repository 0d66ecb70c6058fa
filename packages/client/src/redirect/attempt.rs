//! One hop of a redirect chain and the decision taken for it

use std::error::Error as StdError;

use http::StatusCode;
use url::Url;

/// The redirect about to be followed and the URLs already requested
#[derive(Debug)]
pub struct Attempt<'a> {
    pub(crate) status: StatusCode,
    pub(crate) next: &'a Url,
    pub(crate) previous: &'a [Url],
}

/// What to do with a redirect, produced from an [`Attempt`]
#[derive(Debug)]
pub struct Action {
    pub(crate) inner: ActionKind,
}

#[derive(Debug)]
pub(crate) enum ActionKind {
    Follow,
    Stop,
    Error(Box<dyn StdError + Send + Sync>),
}

impl<'a> Attempt<'a> {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Where the redirect points
    #[must_use]
    pub fn url(&self) -> &Url {
        self.next
    }

    /// URLs requested so far in this chain, oldest first
    #[must_use]
    pub fn previous(&self) -> &[Url] {
        self.previous
    }

    #[must_use]
    pub fn follow(self) -> Action {
        Action {
            inner: ActionKind::Follow,
        }
    }

    /// Hand the redirect response itself back to the caller
    #[must_use]
    pub fn stop(self) -> Action {
        Action {
            inner: ActionKind::Stop,
        }
    }

    /// Fail the request with `error`
    pub fn error<E: Into<Box<dyn StdError + Send + Sync>>>(self, error: E) -> Action {
        Action {
            inner: ActionKind::Error(error.into()),
        }
    }
}

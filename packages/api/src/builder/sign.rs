//! Request signing
//!
//! A [`RequestSigner`] runs last in [`RequestBuilder::build`], over the
//! final method, URL, headers and body, so it can compute signatures such
//! as OAuth 1.0a or HMAC schemes that cover everything sent.

use std::sync::Arc;

use revcache_client::{HttpRequest, Result};

use crate::builder::core::RequestBuilder;

/// Signs a fully assembled request in place
pub trait RequestSigner: Send + Sync {
    /// # Errors
    ///
    /// A failure aborts the request before it reaches the transport.
    fn sign(&self, request: &mut HttpRequest) -> Result<()>;
}

impl<F> RequestSigner for F
where
    F: Fn(&mut HttpRequest) -> Result<()> + Send + Sync,
{
    fn sign(&self, request: &mut HttpRequest) -> Result<()> {
        self(request)
    }
}

impl RequestBuilder {
    /// Sign the request with `signer` once it is built; replaces any earlier signer
    #[must_use]
    pub fn sign(mut self, signer: impl RequestSigner + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }
}

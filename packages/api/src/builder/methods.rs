//! HTTP method implementations
//!
//! Terminal methods that build the request and execute it through the
//! client's transport.

use http::Method;
use revcache_client::{HttpResponse, Result, Transport};

use crate::builder::body::Body;
use crate::builder::core::RequestBuilder;

impl RequestBuilder {
    /// Execute a GET request
    ///
    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    ///
    /// # Examples
    /// ```no_run
    /// use revcache::{CacheBuilder, Client, HyperTransport};
    ///
    /// # async fn run() -> revcache::Result<()> {
    /// let client = Client::with_cache(HyperTransport::new(), CacheBuilder::new());
    /// let users = client.url("https://api.example.com/users")?.get().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(self) -> Result<HttpResponse> {
        self.execute_method(Method::GET).await
    }

    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    pub async fn head(self) -> Result<HttpResponse> {
        self.execute_method(Method::HEAD).await
    }

    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    pub async fn options(self) -> Result<HttpResponse> {
        self.execute_method(Method::OPTIONS).await
    }

    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    pub async fn delete(self) -> Result<HttpResponse> {
        self.execute_method(Method::DELETE).await
    }

    /// Execute a POST request with `body`
    ///
    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    pub async fn post(self, body: Body) -> Result<HttpResponse> {
        self.body(body).execute_method(Method::POST).await
    }

    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    pub async fn put(self, body: Body) -> Result<HttpResponse> {
        self.body(body).execute_method(Method::PUT).await
    }

    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    pub async fn patch(self, body: Body) -> Result<HttpResponse> {
        self.body(body).execute_method(Method::PATCH).await
    }

    /// Execute with `method`, whatever was set before
    ///
    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    pub async fn execute_method(self, method: Method) -> Result<HttpResponse> {
        self.with_method(method).execute().await
    }

    /// Execute with the method set by [`with_method`](Self::with_method), `GET` by default
    ///
    /// # Errors
    ///
    /// Fails on an invalid builder setting or a transport failure.
    pub async fn execute(self) -> Result<HttpResponse> {
        let transport = std::sync::Arc::clone(&self.transport);
        let request = self.build()?;
        tracing::debug!(
            target: "revcache::builder",
            method = %request.method(),
            url = %request.url(),
            "Executing request"
        );
        transport.execute(request).await
    }
}

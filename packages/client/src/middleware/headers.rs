use http::HeaderMap;

use super::Middleware;
use crate::error::Result;
use crate::http::HttpRequest;

/// Adds headers the request does not already carry
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    headers: HeaderMap,
}

impl DefaultHeaders {
    #[must_use]
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

impl Middleware for DefaultHeaders {
    fn process_request(&self, mut request: HttpRequest) -> Result<HttpRequest> {
        for name in self.headers.keys() {
            if request.headers().contains_key(name) {
                continue;
            }
            for value in self.headers.get_all(name) {
                request.headers_mut().append(name.clone(), value.clone());
            }
        }
        Ok(request)
    }
}

//! HTTP request and response descriptions

pub mod request;
pub mod response;

pub use request::{BodyStream, HttpRequest, RequestBody};
pub use response::HttpResponse;

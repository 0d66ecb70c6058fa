//! Request body handling functionality
//!
//! A [`Body`] is either fully in memory or a stream of chunks. Each helper
//! carries the content type it implies; the caller's own `Content-Type`
//! header wins when the request is built.

use std::fmt;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::HeaderValue;
use revcache_client::error::{self, BoxError};
use revcache_client::http::BodyStream;
use revcache_client::Result;
use serde::Serialize;

use crate::builder::core::{ContentType, RequestBuilder};

/// Request body with the content type it implies
pub enum Body {
    InMemory {
        data: Bytes,
        content_type: HeaderValue,
    },
    Streamed {
        stream: BodyStream,
        content_type: HeaderValue,
    },
}

impl Body {
    /// JSON serialization of `value`
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let data = serde_json::to_vec(value).map_err(error::builder)?;
        Ok(Body::InMemory {
            data: Bytes::from(data),
            content_type: ContentType::ApplicationJson.header_value(),
        })
    }

    /// `application/x-www-form-urlencoded` serialization of `value`
    ///
    /// # Errors
    ///
    /// Fails when `value` is not a flat sequence of name/value pairs.
    pub fn form<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let data = serde_urlencoded::to_string(value).map_err(error::builder)?;
        Ok(Body::InMemory {
            data: Bytes::from(data),
            content_type: ContentType::ApplicationFormUrlEncoded.header_value(),
        })
    }

    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Body::InMemory {
            data: Bytes::from(text.into()),
            content_type: HeaderValue::from_static("text/plain; charset=utf-8"),
        }
    }

    #[must_use]
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Body::InMemory {
            data: data.into(),
            content_type: ContentType::ApplicationOctetStream.header_value(),
        }
    }

    /// Chunks produced by `stream`, sent as they arrive
    pub fn stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Body::Streamed {
            stream: stream.map(|chunk| chunk.map_err(Into::<BoxError>::into)).boxed(),
            content_type: ContentType::ApplicationOctetStream.header_value(),
        }
    }

    /// Replace the implied content type
    #[must_use]
    pub fn with_content_type(mut self, value: HeaderValue) -> Self {
        match &mut self {
            Body::InMemory { content_type, .. } | Body::Streamed { content_type, .. } => {
                *content_type = value;
            }
        }
        self
    }

    #[must_use]
    pub fn content_type(&self) -> &HeaderValue {
        match self {
            Body::InMemory { content_type, .. } | Body::Streamed { content_type, .. } => content_type,
        }
    }

    /// Buffered bytes, `None` for a stream
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::InMemory { data, .. } => Some(data),
            Body::Streamed { .. } => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::InMemory { data, content_type } => f
                .debug_struct("InMemory")
                .field("len", &data.len())
                .field("content_type", content_type)
                .finish(),
            Body::Streamed { content_type, .. } => f
                .debug_struct("Streamed")
                .field("content_type", content_type)
                .finish_non_exhaustive(),
        }
    }
}

impl RequestBuilder {
    /// Set the request body, replacing any earlier one
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        tracing::debug!(target: "revcache::builder", body = ?body, "Set request body");
        self.body = Some(body);
        self
    }

    /// Serialize `value` as the JSON body
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        match Body::json(value) {
            Ok(body) => self.body(body),
            Err(err) => self.fail(err),
        }
    }

    /// Serialize `value` as a form body
    #[must_use]
    pub fn form<T: Serialize + ?Sized>(self, value: &T) -> Self {
        match Body::form(value) {
            Ok(body) => self.body(body),
            Err(err) => self.fail(err),
        }
    }

    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(Body::text(text))
    }

    #[must_use]
    pub fn bytes(self, data: impl Into<Bytes>) -> Self {
        self.body(Body::bytes(data))
    }

    #[must_use]
    pub fn stream<S, E>(self, stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.body(Body::stream(stream))
    }

    #[must_use]
    pub fn body_ref(&self) -> Option<&Body> {
        self.body.as_ref()
    }
}

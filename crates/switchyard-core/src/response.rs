//! Body type and response construction

use crate::{Error, Result};
use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use serde::Serialize;

/// Streaming body used for requests and responses on both sides of the proxy
pub type Body = UnsyncBoxBody<Bytes, Error>;

/// Body holding a complete buffer
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body with no data
pub fn empty() -> Body {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Wrap a hyper body without buffering it
pub fn incoming(body: hyper::body::Incoming) -> Body {
    body.map_err(Error::from).boxed_unsync()
}

/// Response builder for convenient response construction
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(header::HeaderName, HeaderValue)>,
}

impl ResponseBuilder {
    /// Create a new response builder
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Set a header
    pub fn header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    fn finish(self, content_type: Option<&'static str>, body: Body) -> Result<Response<Body>> {
        let mut response = Response::builder().status(self.status);

        if let Some(content_type) = content_type {
            response = response.header(header::CONTENT_TYPE, content_type);
        }

        for (name, value) in self.headers {
            response = response.header(name, value);
        }

        Ok(response.body(body)?)
    }

    /// Build response with empty body
    pub fn build(self) -> Result<Response<Body>> {
        self.finish(None, empty())
    }

    /// Build response with text body
    pub fn text(self, body: impl Into<String>) -> Result<Response<Body>> {
        self.finish(Some("text/plain; charset=utf-8"), full(body.into()))
    }

    /// Build response with JSON body
    pub fn json_body<T: Serialize>(self, body: &T) -> Result<Response<Body>> {
        let json = serde_json::to_vec(body)?;
        self.finish(Some("application/json"), full(json))
    }
}

/// Convenience functions for common responses
pub mod responses {
    use super::*;

    /// Plain-text response for a per-request error
    pub fn error(err: &Error) -> Result<Response<Body>> {
        let status = err.to_status_code();
        let reason = status.canonical_reason().unwrap_or("Error");
        ResponseBuilder::new(status).text(reason)
    }
}

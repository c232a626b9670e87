//! Synthetic (terminal) responses produced by the proxy itself.
//!
//! Every terminal response asks the client to close the connection and is
//! sent chunked, so a downstream hop never waits for a body length that will
//! not arrive. When the request carried an `Origin`, CORS headers are echoed
//! so browsers surface the status instead of a network error.

use axum::{
    body::Body,
    http::{
        header::{self, HeaderMap, HeaderValue},
        Response, StatusCode,
    },
};

use crate::http::request::RequestSummary;

/// A status plus headers; the body is always empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalResponse {
    status: StatusCode,
    headers: HeaderMap,
}

impl TerminalResponse {
    /// Build a terminal response answering `request`.
    pub fn for_request(status: StatusCode, request: &RequestSummary) -> Self {
        Self::with_origin(status, request.origin.as_ref())
    }

    pub fn with_origin(status: StatusCode, origin: Option<&HeaderValue>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        if let Some(origin) = origin {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        }
        Self { status, headers }
    }

    pub fn bad_gateway(request: &RequestSummary) -> Self {
        Self::for_request(StatusCode::BAD_GATEWAY, request)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

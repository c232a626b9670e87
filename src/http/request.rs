//! Inbound request view shared by rewrite and security filters.
//!
//! # Responsibilities
//! - Hold the request head and client address while the body streams separately
//! - Extract the addressed target (authority or Host header)
//! - Generate request IDs for forwarded requests

use axum::http::{
    header::{self, HeaderName, HeaderValue},
    request::Parts,
    HeaderMap, Method, Request, Uri, Version,
};
use std::net::{IpAddr, SocketAddr};

use crate::load_balancer::HostPort;

/// Header carrying the request ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request as seen by the filtering core.
///
/// Only the head is held here; rewrite may change URI and headers.
#[derive(Debug)]
pub struct InboundRequest {
    pub head: Parts,
    pub client_addr: SocketAddr,
}

impl InboundRequest {
    pub fn new(head: Parts, client_addr: SocketAddr) -> Self {
        Self { head, client_addr }
    }

    /// Split a full request into the filter view and its body.
    pub fn from_request<B>(request: Request<B>, client_addr: SocketAddr) -> (Self, B) {
        let (head, body) = request.into_parts();
        (Self::new(head, client_addr), body)
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.head.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.head.headers
    }

    /// First value of a header, if it is valid visible ASCII.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn client_ip(&self) -> IpAddr {
        self.client_addr.ip()
    }

    pub fn origin(&self) -> Option<&HeaderValue> {
        self.head.headers.get(header::ORIGIN)
    }

    /// Body length announced by `Content-Length`, if any.
    pub fn declared_body_len(&self) -> Option<u64> {
        self.header(header::CONTENT_LENGTH)?.trim().parse().ok()
    }

    pub fn is_chunked(&self) -> bool {
        self.header(header::TRANSFER_ENCODING)
            .map(|te| te.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    /// The host and port the client addressed: absolute-form URI first, then Host.
    pub fn target(&self) -> Option<HostPort> {
        let default_port = match self.head.uri.scheme_str() {
            Some("https") => 443,
            _ => 80,
        };
        if let Some(authority) = self.head.uri.authority() {
            return HostPort::parse_authority(authority.as_str(), default_port);
        }
        HostPort::parse_authority(self.header(header::HOST)?, default_port)
    }

    /// The parts of the request the response path still needs.
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            method: self.head.method.clone(),
            uri: self.head.uri.clone(),
            origin: self.origin().cloned(),
        }
    }
}

/// What the response path remembers about the request it answers.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: Method,
    pub uri: Uri,
    pub origin: Option<HeaderValue>,
}

impl Default for RequestSummary {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::from_static("/"),
            origin: None,
        }
    }
}

/// Return the request ID header value, generating one if the client sent none.
pub fn ensure_request_id(headers: &mut HeaderMap) -> String {
    if let Some(existing) = headers.get(&X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
        return existing.to_string();
    }
    let id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        headers.insert(X_REQUEST_ID.clone(), value);
    }
    id
}

#[cfg(test)]
pub(crate) fn test_request(builder: axum::http::request::Builder) -> InboundRequest {
    let (inbound, _) = InboundRequest::from_request(
        builder.body(()).unwrap(),
        "192.0.2.10:40000".parse().unwrap(),
    );
    inbound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_from_host_header() {
        let req = test_request(Request::builder().uri("/x").header("host", "App.Local:8080"));
        assert_eq!(req.target(), Some(HostPort::new("app.local", 8080)));

        let req = test_request(Request::builder().uri("/x").header("host", "app.local"));
        assert_eq!(req.target(), Some(HostPort::new("app.local", 80)));

        let req = test_request(Request::builder().uri("/x"));
        assert_eq!(req.target(), None);
    }

    #[test]
    fn target_prefers_absolute_uri() {
        let req = test_request(
            Request::builder()
                .uri("http://upstream.local:81/x")
                .header("host", "other"),
        );
        assert_eq!(req.target(), Some(HostPort::new("upstream.local", 81)));
    }

    #[test]
    fn body_length_and_origin() {
        let req = test_request(
            Request::builder()
                .method("POST")
                .header("content-length", "42")
                .header("origin", "https://a.com"),
        );
        assert_eq!(req.declared_body_len(), Some(42));
        assert_eq!(req.summary().origin.unwrap(), "https://a.com");
    }

    #[test]
    fn request_id_is_preserved_or_generated() {
        let mut headers = HeaderMap::new();
        let generated = ensure_request_id(&mut headers);
        assert_eq!(headers.get(&X_REQUEST_ID).unwrap(), generated.as_str());

        let again = ensure_request_id(&mut headers);
        assert_eq!(again, generated);
    }
}

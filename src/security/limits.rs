//! Request size and shape limits.

use axum::http::Method;

use crate::config::schema::{BodyPolicyConfig, RequestLimitsConfig};
use crate::http::request::InboundRequest;
use crate::security::filter::{FilterError, SecurityFilter};
use crate::security::verdict::SecurityVerdict;

/// Body policy: rejects uploads whose declared length exceeds the limit.
///
/// Raises `BlockBodyPolicy`, so the block is answered only after the body
/// has been read. Chunked uploads declare no length; the host engine counts
/// their bytes against the same limit as it reads them.
#[derive(Debug)]
pub struct BodySizeFilter {
    max_body_bytes: u64,
}

impl BodySizeFilter {
    pub const ID: &'static str = "body";

    pub fn new(config: &BodyPolicyConfig) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Methods whose requests are expected to carry a body.
pub(crate) fn carries_body(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE | Method::CONNECT
    )
}

impl SecurityFilter for BodySizeFilter {
    fn id(&self) -> &str {
        Self::ID
    }

    fn verdict(&self) -> SecurityVerdict {
        SecurityVerdict::BlockBodyPolicy
    }

    fn matches(&self, request: &InboundRequest) -> Result<bool, FilterError> {
        if !carries_body(request.method()) {
            return Ok(false);
        }
        let Some(raw) = request.header(axum::http::header::CONTENT_LENGTH) else {
            return Ok(false);
        };
        let declared: u64 = raw
            .trim()
            .parse()
            .map_err(|_| FilterError::new(Self::ID, format!("unparsable Content-Length {raw:?}")))?;
        Ok(declared > self.max_body_bytes)
    }
}

/// Rejects requests with too many headers or an oversized URI.
#[derive(Debug)]
pub struct RequestLimitsFilter {
    max_header_count: usize,
    max_uri_length: usize,
}

impl RequestLimitsFilter {
    pub const ID: &'static str = "limits";

    pub fn new(config: &RequestLimitsConfig) -> Self {
        Self {
            max_header_count: config.max_header_count,
            max_uri_length: config.max_uri_length,
        }
    }
}

impl SecurityFilter for RequestLimitsFilter {
    fn id(&self) -> &str {
        Self::ID
    }

    fn verdict(&self) -> SecurityVerdict {
        SecurityVerdict::BlockGeneric
    }

    fn matches(&self, request: &InboundRequest) -> Result<bool, FilterError> {
        let header_count = request.headers().len();
        let uri_length = request.uri().to_string().len();
        Ok(header_count > self.max_header_count || uri_length > self.max_uri_length)
    }
}

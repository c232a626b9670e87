//! Response filters enforcing security headers on upstream responses.

use axum::{
    body::Body,
    http::{
        header::{self, HeaderName, HeaderValue},
        Response,
    },
};

use crate::config::schema::ResponseHeadersConfig;
use crate::http::request::RequestSummary;
use crate::pipeline::response::{ResponseFilter, ResponseFilterError};
use crate::proxy::settings::BuildError;

/// Sets and removes configured headers.
#[derive(Debug, Default)]
pub struct HeaderPolicyFilter {
    set: Vec<(HeaderName, HeaderValue)>,
    remove: Vec<HeaderName>,
}

impl HeaderPolicyFilter {
    pub fn from_config(config: &ResponseHeadersConfig) -> Result<Self, BuildError> {
        let mut set = Vec::with_capacity(config.set.len());
        for (name, value) in &config.set {
            let invalid = || BuildError::InvalidHeader(name.clone());
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            set.push((name, value));
        }
        let mut remove = Vec::with_capacity(config.remove.len());
        for name in &config.remove {
            remove.push(
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| BuildError::InvalidHeader(name.clone()))?,
            );
        }
        Ok(Self { set, remove })
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

impl ResponseFilter for HeaderPolicyFilter {
    fn id(&self) -> &str {
        "header_policy"
    }

    fn apply(
        &self,
        _request: &RequestSummary,
        response: &mut Response<Body>,
    ) -> Result<(), ResponseFilterError> {
        let headers = response.headers_mut();
        for name in &self.remove {
            headers.remove(name);
        }
        for (name, value) in &self.set {
            headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Adds `X-Frame-Options` unless the upstream chose one.
#[derive(Debug)]
pub struct FrameOptionsFilter {
    value: HeaderValue,
}

impl FrameOptionsFilter {
    pub fn new(value: &str) -> Result<Self, BuildError> {
        let value = value.to_ascii_uppercase();
        if value != "DENY" && value != "SAMEORIGIN" {
            return Err(BuildError::InvalidHeader(format!("x-frame-options: {value}")));
        }
        HeaderValue::from_str(&value)
            .map(|value| Self { value })
            .map_err(|_| BuildError::InvalidHeader(format!("x-frame-options: {value}")))
    }
}

impl ResponseFilter for FrameOptionsFilter {
    fn id(&self) -> &str {
        "frame_options"
    }

    fn apply(
        &self,
        _request: &RequestSummary,
        response: &mut Response<Body>,
    ) -> Result<(), ResponseFilterError> {
        response
            .headers_mut()
            .entry(header::X_FRAME_OPTIONS)
            .or_insert_with(|| self.value.clone());
        Ok(())
    }
}

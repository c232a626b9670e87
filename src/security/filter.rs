//! The capability every security filter implements.

use thiserror::Error;

use crate::http::request::InboundRequest;
use crate::security::verdict::SecurityVerdict;

/// A filter could not decide whether a request matches.
#[derive(Debug, Error)]
#[error("filter {filter} failed: {reason}")]
pub struct FilterError {
    pub filter: String,
    pub reason: String,
}

impl FilterError {
    pub fn new(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            reason: reason.into(),
        }
    }
}

/// One entry of the security chain.
///
/// A filter carries a fixed verdict; when it matches, that verdict blocks the
/// request. Matching must not mutate the request.
pub trait SecurityFilter: Send + Sync + std::fmt::Debug {
    /// Stable identity used in logs and metrics.
    fn id(&self) -> &str;

    fn verdict(&self) -> SecurityVerdict;

    fn matches(&self, request: &InboundRequest) -> Result<bool, FilterError>;
}

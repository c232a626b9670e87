//! Security verdicts and the terminal status each one maps to.

use axum::http::StatusCode;
use serde::Serialize;

/// Outcome of evaluating the security filter chain for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityVerdict {
    /// No filter matched.
    Allow,
    /// Client exceeded its request rate.
    BlockRateLimited,
    /// The request body violates policy; answered after the body is read.
    BlockBodyPolicy,
    /// Any other block reason.
    BlockGeneric,
}

impl SecurityVerdict {
    pub fn is_block(&self) -> bool {
        !matches!(self, SecurityVerdict::Allow)
    }

    /// Status of the terminal response sent for a blocking verdict.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SecurityVerdict::Allow => None,
            SecurityVerdict::BlockRateLimited => Some(StatusCode::SERVICE_UNAVAILABLE),
            SecurityVerdict::BlockBodyPolicy | SecurityVerdict::BlockGeneric => {
                Some(StatusCode::FORBIDDEN)
            }
        }
    }

    /// Metric and log label.
    pub fn label(&self) -> &'static str {
        match self {
            SecurityVerdict::Allow => "allow",
            SecurityVerdict::BlockRateLimited => "block_rate_limited",
            SecurityVerdict::BlockBodyPolicy => "block_body_policy",
            SecurityVerdict::BlockGeneric => "block_generic",
        }
    }
}

impl std::fmt::Display for SecurityVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

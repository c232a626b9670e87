//! Ordered, short-circuiting security filter chain.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::SecurityConfig;
use crate::http::request::InboundRequest;
use crate::proxy::settings::BuildError;
use crate::security::filter::{FilterError, SecurityFilter};
use crate::security::limits::{BodySizeFilter, RequestLimitsFilter};
use crate::security::rate_limit::CcFilter;
use crate::security::rules::{IpBlacklistFilter, RuleFilter};
use crate::security::verdict::SecurityVerdict;

/// Order entry that expands to every configured rule.
pub const RULES_ENTRY: &str = "rules";

/// Names accepted in `security.order`.
pub const KNOWN_FILTERS: [&str; 5] = [
    IpBlacklistFilter::ID,
    CcFilter::ID,
    RequestLimitsFilter::ID,
    RULES_ENTRY,
    BodySizeFilter::ID,
];

/// A filter failed while the chain was evaluating it.
#[derive(Debug, Error)]
#[error("security filter {filter} failed")]
pub struct SecurityFilterError {
    pub filter: String,
    #[source]
    pub source: FilterError,
}

/// The chain's decision and the filter that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerdict {
    pub verdict: SecurityVerdict,
    /// `None` when no filter matched.
    pub filter: Option<String>,
}

impl ChainVerdict {
    pub fn allow() -> Self {
        Self {
            verdict: SecurityVerdict::Allow,
            filter: None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SecurityFilterChain {
    filters: Vec<Arc<dyn SecurityFilter>>,
}

impl SecurityFilterChain {
    pub fn new(filters: Vec<Arc<dyn SecurityFilter>>) -> Self {
        Self { filters }
    }

    /// Build the enabled filters in `config.order`.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, BuildError> {
        let mut filters: Vec<Arc<dyn SecurityFilter>> = Vec::new();
        let mut seen = HashSet::new();

        for name in &config.order {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match name.as_str() {
                IpBlacklistFilter::ID => {
                    let mut blocked = Vec::with_capacity(config.ip_blacklist.len());
                    for raw in &config.ip_blacklist {
                        let ip: IpAddr = raw
                            .parse()
                            .map_err(|_| BuildError::InvalidIp(raw.clone()))?;
                        blocked.push(ip);
                    }
                    let filter = IpBlacklistFilter::new(blocked);
                    if !filter.is_empty() {
                        filters.push(Arc::new(filter));
                    }
                }
                CcFilter::ID => {
                    if config.rate_limit.enabled {
                        filters.push(Arc::new(CcFilter::new(&config.rate_limit)));
                    }
                }
                RequestLimitsFilter::ID => {
                    if config.limits.enabled {
                        filters.push(Arc::new(RequestLimitsFilter::new(&config.limits)));
                    }
                }
                RULES_ENTRY => {
                    for rule in &config.rules {
                        let filter = RuleFilter::from_config(rule).map_err(|source| {
                            BuildError::InvalidPattern {
                                context: format!("security rule {}", rule.name),
                                source,
                            }
                        })?;
                        filters.push(Arc::new(filter));
                    }
                }
                BodySizeFilter::ID => {
                    if config.body.enabled {
                        filters.push(Arc::new(BodySizeFilter::new(&config.body)));
                    }
                }
                other => return Err(BuildError::UnknownFilter(other.to_string())),
            }
        }

        Ok(Self { filters })
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filter_ids(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.id().to_string()).collect()
    }

    /// Run filters in order; the first match decides.
    pub fn evaluate(&self, request: &InboundRequest) -> Result<ChainVerdict, SecurityFilterError> {
        for filter in &self.filters {
            let matched = filter.matches(request).map_err(|source| SecurityFilterError {
                filter: filter.id().to_string(),
                source,
            })?;
            if matched {
                return Ok(ChainVerdict {
                    verdict: filter.verdict(),
                    filter: Some(filter.id().to_string()),
                });
            }
        }
        Ok(ChainVerdict::allow())
    }
}

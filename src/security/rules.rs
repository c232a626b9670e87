//! Generic block filters: IP blacklist and regex rules.

use std::collections::HashSet;
use std::net::IpAddr;

use axum::http::header;
use regex::{Regex, RegexBuilder};

use crate::config::schema::{RuleConfig, RuleTargetConfig};
use crate::http::request::InboundRequest;
use crate::security::filter::{FilterError, SecurityFilter};
use crate::security::verdict::SecurityVerdict;

/// Blocks listed client IPs.
#[derive(Debug)]
pub struct IpBlacklistFilter {
    blocked: HashSet<IpAddr>,
}

impl IpBlacklistFilter {
    pub const ID: &'static str = "ip_blacklist";

    pub fn new(blocked: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            blocked: blocked.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

impl SecurityFilter for IpBlacklistFilter {
    fn id(&self) -> &str {
        Self::ID
    }

    fn verdict(&self) -> SecurityVerdict {
        SecurityVerdict::BlockGeneric
    }

    fn matches(&self, request: &InboundRequest) -> Result<bool, FilterError> {
        Ok(self.blocked.contains(&request.client_ip()))
    }
}

#[derive(Debug, Clone)]
enum RuleTarget {
    Path,
    Query,
    Cookie,
    UserAgent,
    Method,
    Header(String),
}

/// A named regex rule over one part of the request.
#[derive(Debug)]
pub struct RuleFilter {
    name: String,
    target: RuleTarget,
    pattern: Regex,
}

impl RuleFilter {
    pub fn from_config(config: &RuleConfig) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(&config.pattern)
            .case_insensitive(true)
            .build()?;
        let target = match config.target {
            RuleTargetConfig::Path => RuleTarget::Path,
            RuleTargetConfig::Query => RuleTarget::Query,
            RuleTargetConfig::Cookie => RuleTarget::Cookie,
            RuleTargetConfig::UserAgent => RuleTarget::UserAgent,
            RuleTargetConfig::Method => RuleTarget::Method,
            RuleTargetConfig::Header => {
                RuleTarget::Header(config.header.clone().unwrap_or_default())
            }
        };
        Ok(Self {
            name: config.name.clone(),
            target,
            pattern,
        })
    }

    fn inspect<'a>(&self, request: &'a InboundRequest) -> Vec<&'a str> {
        match &self.target {
            RuleTarget::Path => vec![request.path()],
            RuleTarget::Query => request.query().into_iter().collect(),
            RuleTarget::Method => vec![request.method().as_str()],
            RuleTarget::UserAgent => request.header(header::USER_AGENT).into_iter().collect(),
            RuleTarget::Cookie => header_values(request, header::COOKIE.as_str()),
            RuleTarget::Header(name) => header_values(request, name),
        }
    }
}

fn header_values<'a>(request: &'a InboundRequest, name: &str) -> Vec<&'a str> {
    request
        .headers()
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect()
}

impl SecurityFilter for RuleFilter {
    fn id(&self) -> &str {
        &self.name
    }

    fn verdict(&self) -> SecurityVerdict {
        SecurityVerdict::BlockGeneric
    }

    fn matches(&self, request: &InboundRequest) -> Result<bool, FilterError> {
        Ok(self
            .inspect(request)
            .into_iter()
            .any(|value| self.pattern.is_match(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::test_request;
    use axum::http::Request;

    fn rule(target: RuleTargetConfig, header: Option<&str>, pattern: &str) -> RuleFilter {
        RuleFilter::from_config(&RuleConfig {
            name: "test-rule".into(),
            target,
            header: header.map(str::to_string),
            pattern: pattern.into(),
        })
        .unwrap()
    }

    #[test]
    fn path_rule_is_case_insensitive() {
        let filter = rule(RuleTargetConfig::Path, None, r"/admin");
        assert!(filter.matches(&test_request(Request::builder().uri("/ADMIN/x"))).unwrap());
        assert!(!filter.matches(&test_request(Request::builder().uri("/public"))).unwrap());
        assert_eq!(filter.id(), "test-rule");
    }

    #[test]
    fn query_and_cookie_rules() {
        let sqli = rule(RuleTargetConfig::Query, None, r"union[\s+]+select");
        assert!(sqli
            .matches(&test_request(Request::builder().uri("/?q=1+UNION+select")))
            .unwrap());
        assert!(!sqli
            .matches(&test_request(Request::builder().uri("/?q=safe")))
            .unwrap());
        assert!(!sqli.matches(&test_request(Request::builder().uri("/"))).unwrap());

        let cookie = rule(RuleTargetConfig::Cookie, None, "session=evil");
        let req = test_request(Request::builder().header("cookie", "a=1; session=evil"));
        assert!(cookie.matches(&req).unwrap());
    }

    #[test]
    fn header_and_user_agent_rules() {
        let ua = rule(RuleTargetConfig::UserAgent, None, "sqlmap");
        assert!(ua
            .matches(&test_request(Request::builder().header("user-agent", "sqlmap/1.7")))
            .unwrap());

        let header = rule(RuleTargetConfig::Header, Some("x-scan"), "^yes$");
        assert!(header
            .matches(&test_request(Request::builder().header("x-scan", "YES")))
            .unwrap());
        assert!(!header.matches(&test_request(Request::builder())).unwrap());
    }

    #[test]
    fn blacklist_matches_client_ip() {
        let filter = IpBlacklistFilter::new(["192.0.2.10".parse().unwrap()]);
        assert!(filter.matches(&test_request(Request::builder())).unwrap());

        let other = IpBlacklistFilter::new(["198.51.100.1".parse().unwrap()]);
        assert!(!other.matches(&test_request(Request::builder())).unwrap());
    }
}

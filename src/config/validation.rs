//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that load balancing has groups to balance over
//! - Validate value ranges (weights, capacities, buffer sizes)
//! - Compile every regex once so bad patterns fail at load time
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WafConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

use crate::config::schema::{RuleTargetConfig, WafConfig};
use crate::security::chain::KNOWN_FILTERS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be at least 1")]
    ZeroValue { field: &'static str },

    #[error("lb is on but no upstream groups are configured")]
    LbWithoutUpstreams,

    #[error("upstream group {0} has no servers")]
    EmptyGroup(String),

    #[error("upstream group {0} is configured more than once")]
    DuplicateGroup(String),

    #[error("server {server} appears twice in upstream group {group}")]
    DuplicateServer { group: String, server: String },

    #[error("server {server} in upstream group {group} has weight 0")]
    ZeroWeight { group: String, server: String },

    #[error("{context}: invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { context: String, pattern: String, reason: String },

    #[error("rule {0} targets a header but names none")]
    MissingRuleHeader(String),

    #[error("ip_blacklist entry {0:?} is not an IP address")]
    InvalidIp(String),

    #[error("security.order references unknown filter {0:?}")]
    UnknownFilter(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &WafConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroValue { field: "listener.max_connections" });
    }
    if config.listener.client_write_buffer == 0 {
        errors.push(ValidationError::ZeroValue { field: "listener.client_write_buffer" });
    }
    if config.verdict_cache.capacity == 0 {
        errors.push(ValidationError::ZeroValue { field: "verdict_cache.capacity" });
    }
    if config.retries.max_connect_attempts == 0 {
        errors.push(ValidationError::ZeroValue { field: "retries.max_connect_attempts" });
    }
    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "health_check.interval_secs" });
    }

    if config.lb.is_enabled() && config.upstreams.is_empty() {
        errors.push(ValidationError::LbWithoutUpstreams);
    }

    let mut groups = HashSet::new();
    for group in &config.upstreams {
        let group_name = format!("{}_{}", group.host.to_ascii_lowercase(), group.port);
        if !groups.insert(group_name.clone()) {
            errors.push(ValidationError::DuplicateGroup(group_name.clone()));
        }
        if group.servers.is_empty() {
            errors.push(ValidationError::EmptyGroup(group_name.clone()));
        }
        let mut servers = HashSet::new();
        for server in &group.servers {
            let server_name = format!("{}:{}", server.host.to_ascii_lowercase(), server.port);
            if !servers.insert(server_name.clone()) {
                errors.push(ValidationError::DuplicateServer {
                    group: group_name.clone(),
                    server: server_name.clone(),
                });
            }
            if server.weight == 0 {
                errors.push(ValidationError::ZeroWeight {
                    group: group_name.clone(),
                    server: server_name,
                });
            }
        }
    }

    for (i, rule) in config.rewrite.iter().enumerate() {
        if let Some(pattern) = &rule.path_pattern {
            check_pattern(&mut errors, format!("rewrite[{}]", i), pattern);
        }
    }

    for rule in &config.security.rules {
        check_pattern(&mut errors, format!("rule {}", rule.name), &rule.pattern);
        if rule.target == RuleTargetConfig::Header && rule.header.is_none() {
            errors.push(ValidationError::MissingRuleHeader(rule.name.clone()));
        }
    }

    for ip in &config.security.ip_blacklist {
        if ip.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidIp(ip.clone()));
        }
    }

    for name in &config.security.order {
        if !KNOWN_FILTERS.contains(&name.as_str()) {
            errors.push(ValidationError::UnknownFilter(name.clone()));
        }
    }

    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_pattern(errors: &mut Vec<ValidationError>, context: String, pattern: &str) {
    if let Err(e) = regex::Regex::new(pattern) {
        errors.push(ValidationError::InvalidPattern {
            context,
            pattern: pattern.to_string(),
            reason: e.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RuleConfig, UpstreamGroupConfig, UpstreamServerConfig};

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&WafConfig::default()).is_ok());
    }

    #[test]
    fn test_upstream_errors() {
        let mut config = WafConfig::default();
        let server = UpstreamServerConfig { host: "10.0.0.1".into(), port: 80, weight: 0 };
        config.upstreams.push(UpstreamGroupConfig {
            host: "a".into(),
            port: 80,
            servers: vec![server.clone(), server],
        });
        config.upstreams.push(UpstreamGroupConfig { host: "A".into(), port: 80, servers: vec![] });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateGroup("a_80".into())));
        assert!(errors.contains(&ValidationError::EmptyGroup("a_80".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateServer { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroWeight { .. })));
    }

    #[test]
    fn test_security_errors() {
        let mut config = WafConfig::default();
        config.security.rules.push(RuleConfig {
            name: "bad".into(),
            target: RuleTargetConfig::Header,
            header: None,
            pattern: "(unclosed".into(),
        });
        config.security.ip_blacklist.push("not-an-ip".into());
        config.security.order.push("antivirus".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}

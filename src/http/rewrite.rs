//! Request rewriting, applied before the security filter chain.
//!
//! Rules run in configured order and every matching rule applies. A rule
//! matches when its host (if any) equals the addressed host and its pattern
//! (if any) matches the path and query. A rewrite that produces an invalid
//! URI or header fails the whole request.

use axum::http::{
    header::{HeaderName, HeaderValue},
    uri::PathAndQuery,
    Uri,
};
use regex::Regex;
use thiserror::Error;

use crate::config::schema::RewriteRuleConfig;
use crate::http::request::InboundRequest;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewritten target {target:?} is not a valid URI: {reason}")]
    InvalidUri { target: String, reason: String },

    #[error("header {name:?} cannot be set to {value:?}")]
    InvalidHeader { name: String, value: String },
}

/// Rewrite capability consumed by the request pipeline.
pub trait RewriteFilter: Send + Sync + std::fmt::Debug {
    fn rewrite(&self, request: &mut InboundRequest) -> Result<(), RewriteError>;
}

#[derive(Debug)]
struct RewriteRule {
    host: Option<String>,
    pattern: Option<Regex>,
    replacement: String,
    set_headers: Vec<(String, String)>,
    remove_headers: Vec<String>,
}

impl RewriteRule {
    fn applies_to(&self, request: &InboundRequest) -> bool {
        match &self.host {
            Some(host) => request
                .target()
                .map(|t| t.host().eq_ignore_ascii_case(host))
                .unwrap_or(false),
            None => true,
        }
    }
}

/// Regex-driven rewriter built from `[[rewrite]]` config entries.
#[derive(Debug, Default)]
pub struct RuleRewriter {
    rules: Vec<RewriteRule>,
}

impl RuleRewriter {
    pub fn from_config(configs: &[RewriteRuleConfig]) -> Result<Self, regex::Error> {
        let mut rules = Vec::with_capacity(configs.len());
        for config in configs {
            let pattern = config.path_pattern.as_deref().map(Regex::new).transpose()?;
            rules.push(RewriteRule {
                host: config.host.clone(),
                pattern,
                replacement: config.replacement.clone(),
                set_headers: config
                    .set_headers
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                remove_headers: config.remove_headers.clone(),
            });
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RewriteFilter for RuleRewriter {
    fn rewrite(&self, request: &mut InboundRequest) -> Result<(), RewriteError> {
        for rule in &self.rules {
            if !rule.applies_to(request) {
                continue;
            }

            if let Some(pattern) = &rule.pattern {
                let current = request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".to_string());
                if !pattern.is_match(&current) {
                    continue;
                }
                let rewritten = pattern.replace(&current, rule.replacement.as_str()).into_owned();
                if rewritten != current {
                    request.head.uri = replace_path(request.uri(), &rewritten)?;
                }
            }

            for name in &rule.remove_headers {
                request.headers_mut().remove(name.as_str());
            }
            for (name, value) in &rule.set_headers {
                let invalid = || RewriteError::InvalidHeader {
                    name: name.clone(),
                    value: value.clone(),
                };
                let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
                let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
                request.headers_mut().insert(header_name, header_value);
            }
        }
        Ok(())
    }
}

fn replace_path(uri: &Uri, path_and_query: &str) -> Result<Uri, RewriteError> {
    let invalid = |reason: String| RewriteError::InvalidUri {
        target: path_and_query.to_string(),
        reason,
    };
    if !path_and_query.starts_with('/') {
        return Err(invalid("must start with '/'".to_string()));
    }
    let pq = PathAndQuery::try_from(path_and_query).map_err(|e| invalid(e.to_string()))?;
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(pq);
    Uri::from_parts(parts).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::test_request;
    use axum::http::Request;
    use std::collections::BTreeMap;

    fn rewriter(rules: Vec<RewriteRuleConfig>) -> RuleRewriter {
        RuleRewriter::from_config(&rules).unwrap()
    }

    #[test]
    fn rewrites_path_with_captures() {
        let r = rewriter(vec![RewriteRuleConfig {
            path_pattern: Some("^/old/(.*)$".into()),
            replacement: "/new/$1".into(),
            ..Default::default()
        }]);
        let mut req = test_request(Request::builder().uri("/old/a?b=1").header("host", "x"));
        r.rewrite(&mut req).unwrap();
        assert_eq!(req.uri().path(), "/new/a");
        assert_eq!(req.uri().query(), Some("b=1"));
    }

    #[test]
    fn host_scoped_rule_and_headers() {
        let mut set_headers = BTreeMap::new();
        set_headers.insert("x-waf".to_string(), "1".to_string());
        let r = rewriter(vec![RewriteRuleConfig {
            host: Some("app.local".into()),
            set_headers,
            remove_headers: vec!["x-debug".into()],
            ..Default::default()
        }]);

        let mut other = test_request(Request::builder().uri("/").header("host", "other").header("x-debug", "1"));
        r.rewrite(&mut other).unwrap();
        assert!(other.headers().get("x-waf").is_none());
        assert!(other.headers().get("x-debug").is_some());

        let mut mine = test_request(Request::builder().uri("/").header("host", "app.local:80").header("x-debug", "1"));
        r.rewrite(&mut mine).unwrap();
        assert_eq!(mine.headers()["x-waf"], "1");
        assert!(mine.headers().get("x-debug").is_none());
    }

    #[test]
    fn invalid_result_is_an_error() {
        let r = rewriter(vec![RewriteRuleConfig {
            path_pattern: Some("^/(.*)$".into()),
            replacement: "/bad path/$1".into(),
            ..Default::default()
        }]);
        let mut req = test_request(Request::builder().uri("/x"));
        assert!(matches!(r.rewrite(&mut req), Err(RewriteError::InvalidUri { .. })));
    }

    #[test]
    fn invalid_header_value_is_an_error() {
        let mut set_headers = BTreeMap::new();
        set_headers.insert("x-bad".to_string(), "line\nbreak".to_string());
        let r = rewriter(vec![RewriteRuleConfig { set_headers, ..Default::default() }]);
        let mut req = test_request(Request::builder().uri("/"));
        assert!(matches!(r.rewrite(&mut req), Err(RewriteError::InvalidHeader { .. })));
    }
}

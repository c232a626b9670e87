//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the WAF proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the WAF proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WafConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Whether upstream selection goes through the weighted scheduler.
    pub lb: LbMode,

    /// Upstream groups, keyed by the target clients address.
    pub upstreams: Vec<UpstreamGroupConfig>,

    /// Probing of evicted upstream servers.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Connect retry configuration.
    pub retries: RetryConfig,

    /// Response buffering on the server leg.
    pub buffering: BufferingConfig,

    /// Deferred verdict cache sizing.
    pub verdict_cache: VerdictCacheConfig,

    /// Rewrite rules applied before security filters.
    pub rewrite: Vec<RewriteRuleConfig>,

    /// Security filter chain configuration.
    pub security: SecurityConfig,

    /// Headers enforced on upstream responses.
    pub response_headers: ResponseHeadersConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Synthetic responses that may be queued on a client connection before
    /// it stops reporting itself writable.
    pub client_write_buffer: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            client_write_buffer: 1,
        }
    }
}

/// Load balancing toggle, spelled `"on"` / `"off"` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LbMode {
    On,
    #[default]
    Off,
}

impl LbMode {
    pub fn is_enabled(self) -> bool {
        matches!(self, LbMode::On)
    }
}

/// An upstream group: the target clients address plus the servers behind it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamGroupConfig {
    /// Host clients send requests to (matched against the Host header).
    pub host: String,

    /// Port clients send requests to.
    #[serde(default = "default_http_port")]
    pub port: u16,

    pub servers: Vec<UpstreamServerConfig>,
}

/// Upstream server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamServerConfig {
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Weight for weighted round robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

fn default_http_port() -> u16 {
    80
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable probing of unhealthy servers.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe.
    pub path: String,

    /// Consecutive successful probes before a server is reinstated.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/".to_string(),
            healthy_threshold: 2,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for a client to send request headers, in seconds.
    pub header_read_secs: u64,

    /// Time allowed to finish reading a blocked upload before replying.
    pub deferred_drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            header_read_secs: 30,
            deferred_drain_secs: 10,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Connect attempts per request, each with a fresh upstream selection.
    pub max_connect_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_connect_attempts: 2,
        }
    }
}

/// Response buffering configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BufferingConfig {
    /// Maximum buffered response size; 0 keeps responses streaming.
    pub max_response_buffer_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerdictCacheConfig {
    pub capacity: usize,
}

impl Default for VerdictCacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// A single rewrite rule.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RewriteRuleConfig {
    /// Only rewrite requests addressed to this host.
    pub host: Option<String>,

    /// Regex matched against the path and query.
    pub path_pattern: Option<String>,

    /// Replacement for `path_pattern`, may reference capture groups (`$1`).
    pub replacement: String,

    /// Headers set on matching requests.
    pub set_headers: BTreeMap<String, String>,

    /// Headers removed from matching requests.
    pub remove_headers: Vec<String>,
}

/// Security filter chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Evaluation order by filter name. Unlisted enabled filters are skipped.
    pub order: Vec<String>,

    pub rate_limit: RateLimitConfig,

    pub body: BodyPolicyConfig,

    pub limits: RequestLimitsConfig,

    /// Client IPs rejected outright.
    pub ip_blacklist: Vec<String>,

    pub rules: Vec<RuleConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            order: vec![
                "ip_blacklist".to_string(),
                "cc".to_string(),
                "limits".to_string(),
                "rules".to_string(),
                "body".to_string(),
            ],
            rate_limit: RateLimitConfig::default(),
            body: BodyPolicyConfig::default(),
            limits: RequestLimitsConfig::default(),
            ip_blacklist: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Per-client rate limiting (CC protection).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,

    /// Number of client buckets kept before idle ones are pruned.
    pub max_tracked_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
            max_tracked_clients: 100_000,
        }
    }
}

/// Request body policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyPolicyConfig {
    pub enabled: bool,

    /// Maximum declared body size in bytes.
    pub max_body_bytes: u64,

    /// Bytes of a blocked upload read and discarded before replying.
    pub max_drain_bytes: u64,
}

impl Default for BodyPolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_body_bytes: 10 * 1024 * 1024,
            max_drain_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Request head limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestLimitsConfig {
    pub enabled: bool,
    pub max_header_count: usize,
    pub max_uri_length: usize,
}

impl Default for RequestLimitsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_header_count: 100,
            max_uri_length: 8192,
        }
    }
}

/// Part of the request a rule inspects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTargetConfig {
    Path,
    Query,
    Cookie,
    UserAgent,
    Method,
    Header,
}

/// A generic block rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    pub name: String,
    pub target: RuleTargetConfig,

    /// Header name when `target = "header"`.
    #[serde(default)]
    pub header: Option<String>,

    /// Regex, matched case-insensitively.
    pub pattern: String,
}

/// Headers enforced on upstream responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseHeadersConfig {
    pub set: BTreeMap<String, String>,
    pub remove: Vec<String>,

    /// Value for X-Frame-Options when the upstream did not set one.
    pub frame_options: Option<String>,
}

impl Default for ResponseHeadersConfig {
    fn default() -> Self {
        Self {
            set: BTreeMap::new(),
            remove: vec!["x-powered-by".to_string()],
            frame_options: Some("SAMEORIGIN".to_string()),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

//! Upstream server abstraction and typed identifiers.
//!
//! # Responsibilities
//! - Represent a single upstream server and its configured weight
//! - Provide first-class keys for servers (`host:port`) and groups (`host_port`)

use serde::Serialize;
use std::fmt;

/// A host and port pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostPort {
    host: String,
    port: u16,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            port,
        }
    }

    /// Parse an authority such as `example.com:8080` or `example.com`.
    ///
    /// A missing port falls back to `default_port`. Bracketed IPv6 literals
    /// (`[::1]:80`) are accepted.
    pub fn parse_authority(authority: &str, default_port: u16) -> Option<Self> {
        let authority = authority.trim();
        if authority.is_empty() {
            return None;
        }

        if let Some(rest) = authority.strip_prefix('[') {
            let (host, tail) = rest.split_once(']')?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().ok()?,
                None if tail.is_empty() => default_port,
                None => return None,
            };
            return Some(Self::new(host, port));
        }

        match authority.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                if host.is_empty() {
                    return None;
                }
                Some(Self::new(host, port.parse().ok()?))
            }
            Some(_) => None,
            None => Some(Self::new(authority, default_port)),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address string suitable for `tokio::net::lookup_host`.
    pub fn to_socket_string(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_socket_string())
    }
}

/// Identifies an upstream server within its group, rendered as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ServerKey(HostPort);

impl ServerKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self(HostPort::new(host, port))
    }

    /// Parse the `host:port` form used in logs and the admin API.
    pub fn parse(s: &str) -> Option<Self> {
        let (host, port) = s.rsplit_once(':')?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, port.parse().ok()?))
    }

    pub fn host_port(&self) -> &HostPort {
        &self.0
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies an upstream group by the target a client originally addressed.
///
/// Rendered as `host_port` so it stays usable as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(HostPort);

impl GroupKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self(HostPort::new(host, port))
    }

    /// Parse the `host_port` form.
    pub fn parse(s: &str) -> Option<Self> {
        let (host, port) = s.rsplit_once('_')?;
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, port.parse().ok()?))
    }

    pub fn host_port(&self) -> &HostPort {
        &self.0
    }
}

impl From<HostPort> for GroupKey {
    fn from(target: HostPort) -> Self {
        Self(target)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.0.host, self.0.port)
    }
}

impl Serialize for GroupKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single upstream server.
#[derive(Debug)]
pub struct UpstreamServer {
    key: ServerKey,
    /// Relative share of traffic, always >= 1.
    weight: u32,
}

impl UpstreamServer {
    pub fn new(key: ServerKey, weight: u32) -> Self {
        Self {
            key,
            weight: weight.max(1),
        }
    }

    pub fn key(&self) -> &ServerKey {
        &self.key
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn address(&self) -> &HostPort {
        self.key.host_port()
    }
}

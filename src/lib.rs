//! WAF reverse proxy library.
//!
//! Filters every client request through rewrite rules and an ordered
//! security chain, then forwards allowed requests to an upstream chosen by
//! smooth weighted round robin over the healthy servers of its group.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod proxy;
pub mod security;

pub use config::schema::WafConfig;
pub use http::WafServer;
pub use lifecycle::Shutdown;

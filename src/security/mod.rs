//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after rewrite):
//!     → chain.rs (filters in configured order, first match wins)
//!         ip_blacklist → cc → limits → rules → body
//!     → verdict.rs (verdict → 403 / 503, or deferred 403 for body policy)
//!     → verdict_cache.rs (deferred verdicts wait for the response path)
//!
//! Upstream response:
//!     → headers.rs (header policy, frame options)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a filter error blocks the request with 502
//! - Filters never mutate the request

pub mod chain;
pub mod filter;
pub mod headers;
pub mod limits;
pub mod rate_limit;
pub mod rules;
pub mod verdict;
pub mod verdict_cache;

pub use chain::{ChainVerdict, SecurityFilterChain, SecurityFilterError};
pub use filter::{FilterError, SecurityFilter};
pub use verdict::SecurityVerdict;
pub use verdict_cache::VerdictCache;

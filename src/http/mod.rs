//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, one session per connection)
//!     → request.rs (request head view, target, request ID)
//!     → rewrite.rs (regex rewrite rules)
//!     → [pipeline + coordinator decide]
//!     → response.rs (terminal responses) or upstream response
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod rewrite;
pub mod server;

pub use request::{InboundRequest, RequestSummary, X_REQUEST_ID};
pub use response::TerminalResponse;
pub use rewrite::{RewriteError, RewriteFilter, RuleRewriter};
pub use server::WafServer;

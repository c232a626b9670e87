//! Request and response pipelines around the security core.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → request.rs (rewrite → security chain → Action)
//!         Forward         → upstream
//!         RespondNow      → terminal response now
//!         DeferredBlock   → verdict cached, answered after the body
//!
//! Upstream response (or placeholder)
//!     → response.rs (cached verdict wins, else response filters)
//!     → client
//! ```

pub mod request;
pub mod response;

pub use request::{Action, RequestPipeline};
pub use response::{ResponseFilter, ResponseFilterError, ResponsePipeline};

//! Upstream health subsystem.
//!
//! # Data Flow
//! ```text
//! Connect failure on live traffic (proxy coordinator)
//!     → scheduler.report_failure → server Unhealthy
//!
//! Recovery probing (active.rs):
//!     Periodic timer
//!     → Probe each unhealthy server
//!     → scheduler.report_recovered after consecutive successes
//!
//! State names (state.rs):
//!     Healthy ←→ Unhealthy
//! ```
//!
//! Health state is in memory only and starts Healthy on every restart.

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthState, HealthTransition};

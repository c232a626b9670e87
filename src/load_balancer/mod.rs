//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request target (host:port) → GroupKey
//!     → scheduler.rs (look up upstream group)
//!     → group.rs (lock group state)
//!     → round_robin.rs (smooth weighted pick over healthy slots)
//!     → Return UpstreamServer or NoHealthyServer
//!
//! Connect failure → scheduler.report_failure → group moves server to unhealthy
//! Probe success   → scheduler.report_recovered → group moves server back
//! ```
//!
//! # Design Decisions
//! - Selection policy is stateless; cursor weights live in the group
//! - Unhealthy servers are excluded from selection, not skipped at pick time
//! - Groups and servers come from configuration and are never destroyed

pub mod group;
pub mod round_robin;
pub mod scheduler;
pub mod server;

use crate::load_balancer::group::ServerSlot;

pub use scheduler::{SchedulerError, WeightedScheduler};
pub use server::{GroupKey, HostPort, ServerKey, UpstreamServer};

/// Picks one slot among the healthy servers of a group.
pub trait SelectionPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the index of the chosen slot, or `None` if `slots` is empty.
    fn pick(&self, slots: &mut [ServerSlot]) -> Option<usize>;
}

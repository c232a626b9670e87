//! Upstream health state machine.
//!
//! # States
//! - Healthy: server is eligible for selection
//! - Unhealthy: server excluded from selection after a failure
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: report_failure (connect failure observed)
//! Unhealthy → Healthy: report_recovered (probe or operator)
//! ```
//!
//! Repeating an event in the state it already produced is a no-op.
//! Membership of the group's healthy/unhealthy sets is the source of truth;
//! this module only names the states and transitions for logging and metrics.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn is_healthy(self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => f.write_str("healthy"),
            HealthState::Unhealthy => f.write_str("unhealthy"),
        }
    }
}

/// A state change that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    BecameHealthy,
    BecameUnhealthy,
}

impl HealthTransition {
    pub fn target(self) -> HealthState {
        match self {
            HealthTransition::BecameHealthy => HealthState::Healthy,
            HealthTransition::BecameUnhealthy => HealthState::Unhealthy,
        }
    }
}

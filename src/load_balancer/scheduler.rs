//! Weighted scheduler across all upstream groups.
//!
//! # Responsibilities
//! - Map group keys to their `UpstreamGroup`
//! - Select a healthy server for a group
//! - Apply failure and recovery reports, logging real transitions

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::UpstreamGroupConfig;
use crate::health::state::HealthTransition;
use crate::load_balancer::{
    group::{GroupSnapshot, UpstreamGroup},
    server::{GroupKey, ServerKey, UpstreamServer},
};
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("upstream group {0} is not configured")]
    UnknownGroup(GroupKey),

    #[error("server {server} is not part of upstream group {group}")]
    UnknownServer { group: GroupKey, server: ServerKey },

    #[error("no healthy server left in upstream group {0}")]
    NoHealthyServer(GroupKey),
}

/// Selects upstream servers and tracks their health, per group.
#[derive(Debug, Default)]
pub struct WeightedScheduler {
    groups: HashMap<GroupKey, Arc<UpstreamGroup>>,
}

impl WeightedScheduler {
    /// Create a scheduler from configuration. All servers start healthy.
    pub fn new(configs: &[UpstreamGroupConfig]) -> Self {
        let groups = configs
            .iter()
            .map(|config| {
                let key = GroupKey::new(config.host.clone(), config.port);
                let servers = config
                    .servers
                    .iter()
                    .map(|s| UpstreamServer::new(ServerKey::new(s.host.clone(), s.port), s.weight))
                    .collect();
                UpstreamGroup::new(key, servers)
            })
            .collect();
        Self::from_groups(groups)
    }

    pub fn from_groups(groups: Vec<UpstreamGroup>) -> Self {
        let mut map = HashMap::new();
        for group in groups {
            for server in group.healthy_servers() {
                metrics::record_upstream_health(&group.key().to_string(), &server.to_string(), true);
            }
            tracing::debug!(group = %group.key(), servers = group.len(), "Upstream group registered");
            map.insert(group.key().clone(), Arc::new(group));
        }
        Self { groups: map }
    }

    pub fn group(&self, key: &GroupKey) -> Option<&Arc<UpstreamGroup>> {
        self.groups.get(key)
    }

    pub fn contains_group(&self, key: &GroupKey) -> bool {
        self.groups.contains_key(key)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Arc<UpstreamGroup>> {
        self.groups.values()
    }

    fn require(&self, key: &GroupKey) -> Result<&Arc<UpstreamGroup>, SchedulerError> {
        self.groups
            .get(key)
            .ok_or_else(|| SchedulerError::UnknownGroup(key.clone()))
    }

    /// Select the next healthy server of `group`.
    pub fn select_server(&self, group: &GroupKey) -> Result<Arc<UpstreamServer>, SchedulerError> {
        let selected = self.require(group)?.select();
        match &selected {
            Ok(server) => tracing::trace!(group = %group, server = %server.key(), "Upstream selected"),
            Err(e) => tracing::warn!(group = %group, error = %e, "Upstream selection failed"),
        }
        selected
    }

    /// Evict `server` from the healthy set of `group`. Idempotent.
    pub fn report_failure(&self, group: &GroupKey, server: &ServerKey) -> Result<(), SchedulerError> {
        let transition = self.require(group)?.mark_failed(server)?;
        metrics::record_upstream_failure(&group.to_string(), &server.to_string());
        self.log_transition(group, server, transition);
        Ok(())
    }

    /// Return `server` to the healthy set of `group`. Idempotent.
    pub fn report_recovered(&self, group: &GroupKey, server: &ServerKey) -> Result<(), SchedulerError> {
        let transition = self.require(group)?.mark_recovered(server)?;
        self.log_transition(group, server, transition);
        Ok(())
    }

    fn log_transition(&self, group: &GroupKey, server: &ServerKey, transition: Option<HealthTransition>) {
        let Some(transition) = transition else {
            tracing::debug!(group = %group, server = %server, "Health report did not change state");
            return;
        };
        let state = transition.target();
        match transition {
            HealthTransition::BecameUnhealthy => {
                tracing::warn!(group = %group, server = %server, state = %state, "Upstream server evicted");
            }
            HealthTransition::BecameHealthy => {
                tracing::info!(group = %group, server = %server, state = %state, "Upstream server reinstated");
            }
        }
        metrics::record_upstream_health(&group.to_string(), &server.to_string(), state.is_healthy());
    }

    pub fn snapshot(&self) -> Vec<GroupSnapshot> {
        let mut groups: Vec<GroupSnapshot> = self.groups.values().map(|g| g.snapshot()).collect();
        groups.sort_by(|a, b| a.group.cmp(&b.group));
        groups
    }
}

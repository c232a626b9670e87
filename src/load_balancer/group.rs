//! Upstream group: health sets and scheduling state for one logical target.
//!
//! # Responsibilities
//! - Own the healthy and unhealthy server sets of a group
//! - Keep the weighted round-robin cursor (per-slot current weights)
//! - Apply failure/recovery transitions atomically with respect to selection
//!
//! # Design Decisions
//! - One mutex covers both sets and the cursor, so a server being evicted is
//!   never observable as selectable
//! - Every configured server is in exactly one of the two sets at all times
//! - Configuration order is preserved in the healthy set, which keeps tie
//!   breaking deterministic

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::health::state::{HealthState, HealthTransition};
use crate::load_balancer::{
    round_robin::SmoothWeightedRoundRobin,
    scheduler::SchedulerError,
    server::{GroupKey, ServerKey, UpstreamServer},
    SelectionPolicy,
};

/// A healthy server together with its running schedule weight.
#[derive(Debug)]
pub struct ServerSlot {
    pub server: Arc<UpstreamServer>,
    pub current_weight: i64,
}

impl ServerSlot {
    pub fn new(server: Arc<UpstreamServer>) -> Self {
        Self {
            server,
            current_weight: 0,
        }
    }
}

#[derive(Debug, Default)]
struct GroupState {
    healthy: Vec<ServerSlot>,
    unhealthy: Vec<Arc<UpstreamServer>>,
}

/// Point-in-time view of one server, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub server: ServerKey,
    pub weight: u32,
    pub current_weight: i64,
    pub state: HealthState,
}

/// Point-in-time view of a group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSnapshot {
    pub group: GroupKey,
    pub servers: Vec<ServerStatus>,
}

#[derive(Debug)]
pub struct UpstreamGroup {
    key: GroupKey,
    /// Every configured server by key; never changes after construction.
    servers: HashMap<ServerKey, Arc<UpstreamServer>>,
    /// Configuration order, used to restore ordering on recovery.
    order: Vec<ServerKey>,
    policy: Box<dyn SelectionPolicy>,
    state: Mutex<GroupState>,
}

impl UpstreamGroup {
    /// Create a group where every server starts healthy.
    pub fn new(key: GroupKey, servers: Vec<UpstreamServer>) -> Self {
        Self::with_policy(key, servers, Box::new(SmoothWeightedRoundRobin::new()))
    }

    pub fn with_policy(
        key: GroupKey,
        servers: Vec<UpstreamServer>,
        policy: Box<dyn SelectionPolicy>,
    ) -> Self {
        let mut by_key = HashMap::new();
        let mut order = Vec::new();
        let mut healthy = Vec::new();

        for server in servers {
            if by_key.contains_key(server.key()) {
                tracing::warn!(group = %key, server = %server.key(), "Duplicate upstream server ignored");
                continue;
            }
            let server = Arc::new(server);
            order.push(server.key().clone());
            healthy.push(ServerSlot::new(server.clone()));
            by_key.insert(server.key().clone(), server);
        }

        Self {
            key,
            servers: by_key,
            order,
            policy,
            state: Mutex::new(GroupState {
                healthy,
                unhealthy: Vec::new(),
            }),
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the next healthy server.
    pub fn select(&self) -> Result<Arc<UpstreamServer>, SchedulerError> {
        let mut state = self.lock();
        match self.policy.pick(&mut state.healthy) {
            Some(index) => Ok(state.healthy[index].server.clone()),
            None => Err(SchedulerError::NoHealthyServer(self.key.clone())),
        }
    }

    /// Move a server to the unhealthy set.
    ///
    /// Returns the transition if one happened; `None` when it was already unhealthy.
    pub fn mark_failed(&self, server: &ServerKey) -> Result<Option<HealthTransition>, SchedulerError> {
        self.ensure_known(server)?;
        let mut state = self.lock();

        let Some(pos) = state.healthy.iter().position(|s| s.server.key() == server) else {
            return Ok(None);
        };
        let slot = state.healthy.remove(pos);
        state.unhealthy.push(slot.server);
        Ok(Some(HealthTransition::BecameUnhealthy))
    }

    /// Move a server back to the healthy set with a fresh schedule weight.
    pub fn mark_recovered(&self, server: &ServerKey) -> Result<Option<HealthTransition>, SchedulerError> {
        self.ensure_known(server)?;
        let mut state = self.lock();

        let Some(pos) = state.unhealthy.iter().position(|s| s.key() == server) else {
            return Ok(None);
        };
        let recovered = state.unhealthy.remove(pos);

        // Reinsert at its configured position.
        let rank = |key: &ServerKey| self.order.iter().position(|k| k == key).unwrap_or(usize::MAX);
        let recovered_rank = rank(recovered.key());
        let insert_at = state
            .healthy
            .iter()
            .position(|slot| rank(slot.server.key()) > recovered_rank)
            .unwrap_or(state.healthy.len());
        state.healthy.insert(insert_at, ServerSlot::new(recovered));
        Ok(Some(HealthTransition::BecameHealthy))
    }

    fn ensure_known(&self, server: &ServerKey) -> Result<(), SchedulerError> {
        if self.servers.contains_key(server) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownServer {
                group: self.key.clone(),
                server: server.clone(),
            })
        }
    }

    pub fn health_of(&self, server: &ServerKey) -> Option<HealthState> {
        if !self.servers.contains_key(server) {
            return None;
        }
        let state = self.lock();
        if state.healthy.iter().any(|s| s.server.key() == server) {
            Some(HealthState::Healthy)
        } else {
            Some(HealthState::Unhealthy)
        }
    }

    pub fn healthy_servers(&self) -> Vec<ServerKey> {
        self.lock().healthy.iter().map(|s| s.server.key().clone()).collect()
    }

    pub fn unhealthy_servers(&self) -> Vec<Arc<UpstreamServer>> {
        self.lock().unhealthy.clone()
    }

    pub fn server(&self, key: &ServerKey) -> Option<&Arc<UpstreamServer>> {
        self.servers.get(key)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        let state = self.lock();
        let mut servers: Vec<ServerStatus> = state
            .healthy
            .iter()
            .map(|slot| ServerStatus {
                server: slot.server.key().clone(),
                weight: slot.server.weight(),
                current_weight: slot.current_weight,
                state: HealthState::Healthy,
            })
            .chain(state.unhealthy.iter().map(|server| ServerStatus {
                server: server.key().clone(),
                weight: server.weight(),
                current_weight: 0,
                state: HealthState::Unhealthy,
            }))
            .collect();
        servers.sort_by_key(|s| self.order.iter().position(|k| *k == s.server));

        GroupSnapshot {
            group: self.key.clone(),
            servers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(weights: &[(u16, u32)]) -> UpstreamGroup {
        UpstreamGroup::new(
            GroupKey::new("app.local", 80),
            weights
                .iter()
                .map(|(port, w)| UpstreamServer::new(ServerKey::new("127.0.0.1", *port), *w))
                .collect(),
        )
    }

    fn key(port: u16) -> ServerKey {
        ServerKey::new("127.0.0.1", port)
    }

    fn assert_partitioned(g: &UpstreamGroup) {
        let healthy = g.healthy_servers();
        let unhealthy: Vec<ServerKey> = g.unhealthy_servers().iter().map(|s| s.key().clone()).collect();
        assert_eq!(healthy.len() + unhealthy.len(), g.len());
        for k in &healthy {
            assert!(!unhealthy.contains(k));
        }
    }

    #[test]
    fn test_failure_is_idempotent() {
        let g = group(&[(1, 1), (2, 1)]);
        assert_eq!(g.mark_failed(&key(1)).unwrap(), Some(HealthTransition::BecameUnhealthy));
        for _ in 0..5 {
            assert_eq!(g.mark_failed(&key(1)).unwrap(), None);
            assert_eq!(g.health_of(&key(1)), Some(HealthState::Unhealthy));
            assert_partitioned(&g);
        }
        assert_eq!(g.unhealthy_servers().len(), 1);

        assert_eq!(g.mark_recovered(&key(1)).unwrap(), Some(HealthTransition::BecameHealthy));
        assert_eq!(g.health_of(&key(1)), Some(HealthState::Healthy));
        assert_eq!(g.mark_recovered(&key(1)).unwrap(), None);
        assert_partitioned(&g);
    }

    #[test]
    fn test_unknown_server() {
        let g = group(&[(1, 1)]);
        assert!(matches!(
            g.mark_failed(&key(9)),
            Err(SchedulerError::UnknownServer { .. })
        ));
        assert!(g.health_of(&key(9)).is_none());
    }

    #[test]
    fn test_select_skips_unhealthy() {
        let g = group(&[(1, 5), (2, 1)]);
        g.mark_failed(&key(1)).unwrap();
        for _ in 0..20 {
            assert_eq!(g.select().unwrap().key(), &key(2));
        }
        g.mark_failed(&key(2)).unwrap();
        assert!(matches!(g.select(), Err(SchedulerError::NoHealthyServer(_))));
    }

    #[test]
    fn test_recovery_restores_config_order() {
        let g = group(&[(1, 1), (2, 1), (3, 1)]);
        g.mark_failed(&key(1)).unwrap();
        g.mark_failed(&key(2)).unwrap();
        g.mark_recovered(&key(2)).unwrap();
        g.mark_recovered(&key(1)).unwrap();
        assert_eq!(g.healthy_servers(), vec![key(1), key(2), key(3)]);
    }

    #[test]
    fn test_snapshot_reports_states() {
        let g = group(&[(1, 3), (2, 1)]);
        g.mark_failed(&key(1)).unwrap();
        let snap = g.snapshot();
        assert_eq!(snap.servers.len(), 2);
        assert_eq!(snap.servers[0].server, key(1));
        assert_eq!(snap.servers[0].state, HealthState::Unhealthy);
        assert_eq!(snap.servers[1].state, HealthState::Healthy);
    }

    #[test]
    fn test_concurrent_select_and_evict() {
        let g = Arc::new(group(&[(1, 1), (2, 1), (3, 1)]));
        let mut handles = Vec::new();
        for t in 0..4 {
            let g = g.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..500 {
                    if t == 0 && i % 7 == 0 {
                        let _ = g.mark_failed(&key(1));
                    } else if t == 0 && i % 11 == 0 {
                        let _ = g.mark_recovered(&key(1));
                    } else {
                        let _ = g.select();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_partitioned(&g);
    }
}

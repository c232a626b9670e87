//! Connection coordinator: the host engine's single [`ProxyHooks`] object.
//!
//! # Responsibilities
//! - Register client legs and capture their settings snapshot
//! - Route requests through the request and response pipelines
//! - Choose upstreams (scheduler when lb is on, addressed target otherwise)
//! - Report connect failures against the server chosen at resolution
//! - Cascade server leg close to the client leg
//! - Shape the server pipeline once connected

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Body, http::Response};
use dashmap::DashMap;

use crate::http::request::InboundRequest;
use crate::http::response::TerminalResponse;
use crate::load_balancer::{GroupKey, HostPort, SchedulerError, WeightedScheduler};
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::pipeline::Action;
use crate::proxy::hooks::{
    ClientLeg, PipelineStage, ProxyHooks, ServerLegId, ServerPipeline, UpstreamBinding,
};
use crate::proxy::pair::ConnectionPair;
use crate::proxy::settings::{Settings, SettingsStore};

/// Where a request should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamChoice {
    pub address: HostPort,
    /// Set when the scheduler picked the server.
    pub binding: Option<UpstreamBinding>,
}

#[derive(Debug)]
pub struct ConnectionCoordinator {
    settings: Arc<SettingsStore>,
    scheduler: Arc<WeightedScheduler>,
    pairs: DashMap<ConnectionId, ConnectionPair>,
}

impl ConnectionCoordinator {
    pub fn new(settings: Arc<SettingsStore>, scheduler: Arc<WeightedScheduler>) -> Self {
        Self {
            settings,
            scheduler,
            pairs: DashMap::new(),
        }
    }

    /// Track a new client connection. Returns the snapshot it will use.
    pub fn register_client(&self, id: ConnectionId, client: Arc<dyn ClientLeg>) -> Arc<Settings> {
        let settings = self.settings.load();
        self.pairs
            .insert(id, ConnectionPair::new(client, Arc::clone(&settings)));
        tracing::trace!(connection_id = %id, "Client leg registered");
        settings
    }

    fn captured_settings(&self, id: ConnectionId) -> Arc<Settings> {
        self.pairs
            .get(&id)
            .map(|pair| Arc::clone(&pair.settings))
            .unwrap_or_else(|| self.settings.load())
    }

    /// Pick the upstream for a request addressed to `target`.
    pub fn select_upstream(
        &self,
        id: ConnectionId,
        target: &HostPort,
    ) -> Result<UpstreamChoice, SchedulerError> {
        let settings = self.captured_settings(id);
        let group = GroupKey::from(target.clone());

        if !settings.lb_enabled() || !self.scheduler.contains_group(&group) {
            return Ok(UpstreamChoice {
                address: target.clone(),
                binding: None,
            });
        }

        let server = self.scheduler.select_server(&group)?;
        Ok(UpstreamChoice {
            address: server.address().clone(),
            binding: Some(UpstreamBinding {
                group,
                server: server.key().clone(),
            }),
        })
    }

    pub fn scheduler(&self) -> &Arc<WeightedScheduler> {
        &self.scheduler
    }

    pub fn settings_store(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Connections whose pair record is still live.
    pub fn active_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// A chunked upload ran past the body limit while being read. The block
    /// is deferred like a declared-length one and replayed on the next
    /// response for this connection.
    pub fn on_body_limit_exceeded(&self, id: ConnectionId) {
        let Some((settings, summary)) = self
            .pairs
            .get(&id)
            .map(|pair| (Arc::clone(&pair.settings), pair.request.clone()))
        else {
            tracing::warn!(connection_id = %id, "Body limit exceeded on unregistered connection");
            return;
        };
        settings.request.defer_body_block(id, &summary);
    }

    fn remove_if_finished(&self, id: ConnectionId) {
        if self.pairs.remove_if(&id, |_, pair| pair.is_finished()).is_some() {
            tracing::trace!(connection_id = %id, "Connection pair released");
        }
    }
}

impl ProxyHooks for ConnectionCoordinator {
    fn on_client_request(&self, id: ConnectionId, request: &mut InboundRequest) -> Action {
        let settings = self.captured_settings(id);
        let action = settings.request.on_request(id, request);

        match self.pairs.get_mut(&id) {
            Some(mut pair) => {
                pair.request = request.summary();
                pair.binding = None;
            }
            None => tracing::warn!(connection_id = %id, "Request on unregistered connection"),
        }
        action
    }

    fn on_resolution_succeeded(
        &self,
        id: ConnectionId,
        binding: Option<UpstreamBinding>,
        address: SocketAddr,
    ) {
        let Some(mut pair) = self.pairs.get_mut(&id) else {
            tracing::warn!(connection_id = %id, "Resolution for unregistered connection");
            return;
        };
        tracing::debug!(
            connection_id = %id,
            address = %address,
            group = ?binding.as_ref().map(|b| b.group.to_string()),
            server = ?binding.as_ref().map(|b| b.server.to_string()),
            "Upstream resolved"
        );
        pair.binding = if pair.settings.lb_enabled() { binding } else { None };
    }

    fn on_resolution_failed(&self, id: ConnectionId, reason: &str) -> bool {
        let Some((client, summary)) = self
            .pairs
            .get(&id)
            .map(|pair| (Arc::clone(&pair.client), pair.request.clone()))
        else {
            tracing::warn!(connection_id = %id, reason, "Resolution failed on unregistered connection");
            return false;
        };

        tracing::warn!(connection_id = %id, reason, uri = %summary.uri, "Upstream resolution failed");

        if !client.is_writable() {
            metrics::record_dropped_write();
            tracing::debug!(connection_id = %id, "Client leg not writable, dropping 502");
            return false;
        }

        let written = client.write(TerminalResponse::bad_gateway(&summary));
        if written {
            metrics::record_synthetic_response(502);
        } else {
            metrics::record_dropped_write();
            tracing::debug!(connection_id = %id, "Client leg refused 502");
        }
        written
    }

    fn on_connect_failed(&self, id: ConnectionId) {
        let (binding, lb_enabled) = match self.pairs.get_mut(&id) {
            Some(mut pair) => (pair.binding.take(), pair.settings.lb_enabled()),
            None => {
                tracing::warn!(connection_id = %id, "Connect failure on unregistered connection");
                return;
            }
        };
        if !lb_enabled {
            return;
        }
        let Some(binding) = binding else {
            tracing::warn!(connection_id = %id, "Connect failure without a scheduled upstream");
            return;
        };

        match self.scheduler.report_failure(&binding.group, &binding.server) {
            Ok(()) => tracing::warn!(
                connection_id = %id,
                group = %binding.group,
                server = %binding.server,
                "Upstream connect failed"
            ),
            Err(e) => tracing::warn!(
                connection_id = %id,
                error = %e,
                "Could not report upstream failure"
            ),
        }
    }

    fn on_connect_succeeded(&self, id: ConnectionId, pipeline: &mut dyn ServerPipeline) {
        for stage in [PipelineStage::Decompress, PipelineStage::Aggregate] {
            if pipeline.remove_stage(stage) {
                tracing::trace!(connection_id = %id, stage = ?stage, "Server pipeline stage removed");
            }
        }
    }

    fn on_request_sending(&self, id: ConnectionId, leg: ServerLegId) {
        match self.pairs.get_mut(&id) {
            Some(mut pair) => pair.server_leg = Some(leg),
            None => tracing::debug!(connection_id = %id, leg = %leg, "Request sending on released connection"),
        }
    }

    fn on_server_response(&self, id: ConnectionId, response: Response<Body>) -> Response<Body> {
        let (settings, summary) = match self.pairs.get(&id) {
            Some(pair) => (Arc::clone(&pair.settings), pair.request.clone()),
            None => (self.settings.load(), Default::default()),
        };
        settings.response.on_response(id, &summary, response)
    }

    fn on_server_closed(&self, id: ConnectionId, leg: ServerLegId) {
        let client = {
            let Some(mut pair) = self.pairs.get_mut(&id) else {
                return;
            };
            if pair.server_leg != Some(leg) {
                tracing::trace!(connection_id = %id, leg = %leg, "Ignoring close of unarmed server leg");
                return;
            }
            pair.server_leg = None;
            pair.client_open.then(|| Arc::clone(&pair.client))
        };
        self.remove_if_finished(id);

        if let Some(client) = client {
            if client.is_active() {
                tracing::debug!(connection_id = %id, leg = %leg, "Server leg closed, closing client leg");
                client.close();
            }
        }
    }

    fn on_client_closed(&self, id: ConnectionId) {
        if let Some(mut pair) = self.pairs.get_mut(&id) {
            pair.client_open = false;
        }
        self.remove_if_finished(id);

        if self.settings.verdict_cache().take(id).is_some() {
            tracing::debug!(connection_id = %id, "Discarded unreplayed deferred verdict");
        }
    }
}

//! Per-connection record pairing the client leg with its server leg.

use std::sync::Arc;

use crate::http::request::RequestSummary;
use crate::proxy::hooks::{ClientLeg, ServerLegId, UpstreamBinding};
use crate::proxy::settings::Settings;

#[derive(Debug)]
pub struct ConnectionPair {
    pub client: Arc<dyn ClientLeg>,
    pub client_open: bool,
    /// Armed server leg; set when a request is sent on it.
    pub server_leg: Option<ServerLegId>,
    /// Recorded at resolution, consumed by connect failure.
    pub binding: Option<UpstreamBinding>,
    /// Snapshot captured when the client connected.
    pub settings: Arc<Settings>,
    /// Latest request on this connection.
    pub request: RequestSummary,
}

impl ConnectionPair {
    pub fn new(client: Arc<dyn ClientLeg>, settings: Arc<Settings>) -> Self {
        Self {
            client,
            client_open: true,
            server_leg: None,
            binding: None,
            settings,
            request: RequestSummary::default(),
        }
    }

    /// True once neither leg can produce further events.
    pub fn is_finished(&self) -> bool {
        !self.client_open && self.server_leg.is_none()
    }
}

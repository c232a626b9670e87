//! Capabilities exchanged between the host engine and the coordinator.
//!
//! The host engine owns sockets and HTTP framing. It reports lifecycle
//! events through [`ProxyHooks`] and exposes the client side of a connection
//! as a [`ClientLeg`] and the server side's processing stages as a
//! [`ServerPipeline`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{body::Body, http::Response};

use crate::http::request::InboundRequest;
use crate::http::response::TerminalResponse;
use crate::load_balancer::{GroupKey, ServerKey};
use crate::net::ConnectionId;
use crate::pipeline::Action;

/// The client-facing half of a proxied connection.
pub trait ClientLeg: Send + Sync + std::fmt::Debug {
    fn is_active(&self) -> bool;

    /// Whether a synthetic response can be queued without blocking.
    fn is_writable(&self) -> bool;

    /// Queue a synthetic response. Returns false if it was not queued.
    fn write(&self, response: TerminalResponse) -> bool;

    /// Close the leg. Idempotent.
    fn close(&self);
}

/// Optional processing stages on the server leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Decompress,
    Aggregate,
}

pub trait ServerPipeline {
    fn has_stage(&self, stage: PipelineStage) -> bool;

    /// Remove `stage`; returns whether it was present.
    fn remove_stage(&mut self, stage: PipelineStage) -> bool;
}

static SERVER_LEG_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one upstream connection of a client connection.
///
/// A client connection may switch upstreams; close events from a replaced
/// leg carry a stale id and must not close the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerLegId(u64);

impl ServerLegId {
    pub fn next() -> Self {
        Self(SERVER_LEG_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ServerLegId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "leg-{}", self.0)
    }
}

/// Group and server a request was scheduled to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamBinding {
    pub group: GroupKey,
    pub server: ServerKey,
}

/// Lifecycle events of a proxied connection.
///
/// Every hook contains its own failures: it logs and returns, it never
/// panics on missing state or propagates an error to the engine.
pub trait ProxyHooks: Send + Sync {
    /// Rewrite and filter a request head.
    fn on_client_request(&self, id: ConnectionId, request: &mut InboundRequest) -> Action;

    /// The upstream address is known. `binding` is set when the scheduler chose it.
    fn on_resolution_succeeded(
        &self,
        id: ConnectionId,
        binding: Option<UpstreamBinding>,
        address: SocketAddr,
    );

    /// No upstream address could be determined. Returns whether a 502 was
    /// queued on the client leg.
    fn on_resolution_failed(&self, id: ConnectionId, reason: &str) -> bool;

    fn on_connect_failed(&self, id: ConnectionId);

    fn on_connect_succeeded(&self, id: ConnectionId, pipeline: &mut dyn ServerPipeline);

    /// A request is about to go out on `leg`; from here on its close cascades.
    fn on_request_sending(&self, id: ConnectionId, leg: ServerLegId);

    fn on_server_response(&self, id: ConnectionId, response: Response<Body>) -> Response<Body>;

    fn on_server_closed(&self, id: ConnectionId, leg: ServerLegId);

    fn on_client_closed(&self, id: ConnectionId);
}

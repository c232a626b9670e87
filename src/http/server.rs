//! Host engine: client connections, upstream connections, HTTP framing.
//!
//! # Responsibilities
//! - Accept client connections under the listener's connection limit
//! - Serve HTTP/1.1 per connection with hyper, one request at a time
//! - Feed every lifecycle event to the connection coordinator
//! - Resolve, connect and forward allowed requests upstream
//! - Drain bodies of deferred blocks before answering
//! - Apply config reloads and shut down gracefully

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    body::{Body, BodyDataStream},
    http::{
        header::{self, HeaderName, HeaderValue},
        uri::PathAndQuery,
        Request, Response, Uri, Version,
    },
};
use futures_util::StreamExt;
use hyper::{body::Incoming, client::conn::http1::SendRequest, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::schema::{UpstreamGroupConfig, WafConfig};
use crate::http::request::{ensure_request_id, InboundRequest};
use crate::http::response::TerminalResponse;
use crate::load_balancer::{HostPort, WeightedScheduler};
use crate::net::{ConnectionGuard, ConnectionId, ConnectionPermit, ConnectionTracker, Listener};
use crate::observability::metrics;
use crate::pipeline::Action;
use crate::proxy::{
    BuildError, ClientLeg, ConnectionCoordinator, PipelineStage, ProxyHooks, ServerLegId,
    ServerPipeline, Settings, SettingsStore,
};

/// How long shutdown waits for open connections.
const DRAIN_LIMIT: Duration = Duration::from_secs(30);

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

/// Errors that end a client connection without a response.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream resolution failed: {0}")]
    Unresolved(String),

    #[error("reading request body failed: {0}")]
    ClientBody(String),
}

#[derive(Debug, Error)]
enum ConnectError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(#[from] hyper::Error),
}

/// Engine parameters fixed at startup.
#[derive(Debug, Clone)]
struct EngineOptions {
    connect_timeout: Duration,
    header_read_timeout: Duration,
    drain_timeout: Duration,
    max_drain_bytes: u64,
    max_connect_attempts: u32,
    client_write_buffer: usize,
}

impl EngineOptions {
    fn from_config(config: &WafConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            header_read_timeout: Duration::from_secs(config.timeouts.header_read_secs),
            drain_timeout: Duration::from_secs(config.timeouts.deferred_drain_secs),
            max_drain_bytes: config.security.body.max_drain_bytes,
            max_connect_attempts: config.retries.max_connect_attempts.max(1),
            client_write_buffer: config.listener.client_write_buffer.max(1),
        }
    }
}

/// The WAF reverse proxy server.
pub struct WafServer {
    options: EngineOptions,
    coordinator: Arc<ConnectionCoordinator>,
    tracker: ConnectionTracker,
    topology: String,
}

impl WafServer {
    /// Build the scheduler, settings snapshot and coordinator from `config`.
    pub fn new(config: &WafConfig) -> Result<Self, BuildError> {
        let settings = Arc::new(SettingsStore::new(config)?);
        let scheduler = Arc::new(WeightedScheduler::new(&config.upstreams));
        Ok(Self {
            options: EngineOptions::from_config(config),
            coordinator: Arc::new(ConnectionCoordinator::new(settings, scheduler)),
            tracker: ConnectionTracker::new(),
            topology: topology_fingerprint(&config.upstreams),
        })
    }

    pub fn coordinator(&self) -> Arc<ConnectionCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept and serve connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: Listener,
        mut config_updates: mpsc::UnboundedReceiver<WafConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "WAF proxy listening");

        let (closing_tx, closing_rx) = watch::channel(false);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let connection = ClientConnection {
                            coordinator: Arc::clone(&self.coordinator),
                            options: self.options.clone(),
                            guard: self.tracker.track(),
                            permit,
                            peer,
                            closing: closing_rx.clone(),
                        };
                        tokio::spawn(connection.serve(stream));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Some(config) = config_updates.recv() => self.apply_config(&config),
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!(open = self.tracker.active_count(), "Shutting down, draining connections");
        closing_tx.send_replace(true);
        if !self.tracker.wait_for_drain(DRAIN_LIMIT).await {
            tracing::warn!(open = self.tracker.active_count(), "Drain limit reached with open connections");
        }
        tracing::info!("WAF proxy stopped");
        Ok(())
    }

    fn apply_config(&self, config: &WafConfig) {
        if let Err(e) = self.coordinator.settings_store().reload(config) {
            tracing::error!(error = %e, "Reloaded config rejected, keeping current settings");
            return;
        }
        if topology_fingerprint(&config.upstreams) != self.topology {
            tracing::warn!("Upstream topology changed; restart to apply it");
        }
    }
}

fn topology_fingerprint(groups: &[UpstreamGroupConfig]) -> String {
    let mut parts: Vec<String> = groups
        .iter()
        .map(|g| {
            let servers: Vec<String> = g
                .servers
                .iter()
                .map(|s| format!("{}:{}*{}", s.host, s.port, s.weight))
                .collect();
            format!("{}:{}=[{}]", g.host, g.port, servers.join(","))
        })
        .collect();
    parts.sort();
    parts.join(";")
}

/// Client leg handed to the coordinator.
///
/// A connection serves one request at a time, and a synthetic response
/// reaches the client as the answer to the request in flight, through the
/// outbox. Writability is therefore not a socket buffer reading: the leg is
/// writable while it is active, not shutting down, and the outbox has room.
#[derive(Debug)]
struct ClientHandle {
    active: AtomicBool,
    draining: AtomicBool,
    close: watch::Sender<bool>,
    outbox: mpsc::Sender<TerminalResponse>,
}

impl ClientHandle {
    fn new(
        outbox_capacity: usize,
    ) -> (Arc<Self>, watch::Receiver<bool>, mpsc::Receiver<TerminalResponse>) {
        let (close, close_rx) = watch::channel(false);
        let (outbox, outbox_rx) = mpsc::channel(outbox_capacity.max(1));
        let handle = Arc::new(Self {
            active: AtomicBool::new(true),
            draining: AtomicBool::new(false),
            close,
            outbox,
        });
        (handle, close_rx, outbox_rx)
    }

    /// The connection finishes its current request and takes no more.
    fn begin_drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }
}

impl ClientLeg for ClientHandle {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn is_writable(&self) -> bool {
        self.is_active() && !self.draining.load(Ordering::SeqCst) && self.outbox.capacity() > 0
    }

    fn write(&self, response: TerminalResponse) -> bool {
        self.outbox.try_send(response).is_ok()
    }

    fn close(&self) {
        self.begin_drain();
        if self.active.swap(false, Ordering::SeqCst) {
            self.close.send_replace(true);
        }
    }
}

/// Server leg stage markers.
///
/// Buffering installs `Decompress` and `Aggregate`; the coordinator strips
/// both once the upstream connects, so responses always stream through.
#[derive(Debug)]
struct UpstreamPipeline {
    stages: Vec<PipelineStage>,
}

impl UpstreamPipeline {
    fn new(max_buffer_bytes: usize) -> Self {
        let stages = if max_buffer_bytes > 0 {
            vec![PipelineStage::Decompress, PipelineStage::Aggregate]
        } else {
            Vec::new()
        };
        Self { stages }
    }
}

impl ServerPipeline for UpstreamPipeline {
    fn has_stage(&self, stage: PipelineStage) -> bool {
        self.stages.contains(&stage)
    }

    fn remove_stage(&mut self, stage: PipelineStage) -> bool {
        let before = self.stages.len();
        self.stages.retain(|s| *s != stage);
        self.stages.len() != before
    }
}

enum BufferedBody {
    Complete(Vec<u8>),
    /// The rest of the body, still unread.
    OverLimit(BodyDataStream),
}

struct UpstreamConnection {
    address: HostPort,
    leg: ServerLegId,
    sender: SendRequest<Body>,
}

struct ClientConnection {
    coordinator: Arc<ConnectionCoordinator>,
    options: EngineOptions,
    guard: ConnectionGuard,
    permit: ConnectionPermit,
    peer: SocketAddr,
    closing: watch::Receiver<bool>,
}

impl ClientConnection {
    async fn serve(self, stream: TcpStream) {
        let Self {
            coordinator,
            options,
            guard,
            permit,
            peer,
            mut closing,
        } = self;
        let id = guard.id();

        let (client, mut close_rx, outbox_rx) = ClientHandle::new(options.client_write_buffer);
        let settings = coordinator.register_client(id, client.clone());
        tracing::debug!(connection_id = %id, peer = %peer, "Client connected");

        let session = Arc::new(Session {
            id,
            peer,
            coordinator: Arc::clone(&coordinator),
            settings,
            options: options.clone(),
            outbox: Mutex::new(outbox_rx),
            upstream: tokio::sync::Mutex::new(None),
        });

        let service = service_fn(move |request: Request<Incoming>| {
            let session = Arc::clone(&session);
            async move { session.handle(request).await }
        });

        let connection = hyper::server::conn::http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(options.header_read_timeout)
            .serve_connection(TokioIo::new(stream), service);
        let mut connection = std::pin::pin!(connection);

        let mut graceful = false;
        loop {
            tokio::select! {
                result = connection.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!(connection_id = %id, error = %e, "Client connection ended with error");
                    }
                    break;
                }
                _ = close_rx.changed(), if !graceful => {
                    tracing::debug!(connection_id = %id, "Client leg closing");
                    graceful = true;
                    connection.as_mut().graceful_shutdown();
                }
                _ = closing.changed(), if !graceful => {
                    graceful = true;
                    client.begin_drain();
                    connection.as_mut().graceful_shutdown();
                }
            }
        }

        client.active.store(false, Ordering::SeqCst);
        coordinator.on_client_closed(id);
        tracing::debug!(connection_id = %id, "Client disconnected");
        drop(permit);
        drop(guard);
    }
}

/// Per-connection request handling state.
struct Session {
    id: ConnectionId,
    peer: SocketAddr,
    coordinator: Arc<ConnectionCoordinator>,
    settings: Arc<Settings>,
    options: EngineOptions,
    outbox: Mutex<mpsc::Receiver<TerminalResponse>>,
    upstream: tokio::sync::Mutex<Option<UpstreamConnection>>,
}

impl Session {
    async fn handle(self: Arc<Self>, request: Request<Incoming>) -> Result<Response<Body>, ProxyError> {
        let (mut inbound, body) = InboundRequest::from_request(request, self.peer);
        let body = Body::new(body);

        let response = match self.coordinator.on_client_request(self.id, &mut inbound) {
            Action::RespondNow(response) => response.into_response(),
            Action::DeferredBlock(_) => {
                self.drain(body.into_data_stream()).await;
                self.deferred_answer(&inbound)
            }
            Action::Forward => match self.settings.request.streamed_body_limit(&inbound) {
                None => self.forward(inbound, body).await?,
                Some(limit) => match self.buffer_body(body, limit).await? {
                    BufferedBody::Complete(bytes) => {
                        let headers = inbound.headers_mut();
                        headers.remove(header::TRANSFER_ENCODING);
                        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                        self.forward(inbound, Body::from(bytes)).await?
                    }
                    BufferedBody::OverLimit(rest) => {
                        self.coordinator.on_body_limit_exceeded(self.id);
                        self.drain(rest).await;
                        self.deferred_answer(&inbound)
                    }
                },
            },
        };

        metrics::record_request(response.status().as_u16());
        Ok(response)
    }

    /// Answer a deferred block: the placeholder is replaced by the cached
    /// verdict, and stays a 502 if that entry was evicted.
    fn deferred_answer(&self, inbound: &InboundRequest) -> Response<Body> {
        let placeholder = TerminalResponse::bad_gateway(&inbound.summary()).into_response();
        self.coordinator.on_server_response(self.id, placeholder)
    }

    /// Read a chunked upload into memory, stopping once it passes `limit`.
    async fn buffer_body(&self, body: Body, limit: u64) -> Result<BufferedBody, ProxyError> {
        let mut stream = body.into_data_stream();
        let mut buffered = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProxyError::ClientBody(e.to_string()))?;
            buffered.extend_from_slice(&chunk);
            if buffered.len() as u64 > limit {
                tracing::debug!(
                    connection_id = %self.id,
                    read = buffered.len(),
                    limit,
                    "Chunked body over limit"
                );
                return Ok(BufferedBody::OverLimit(stream));
            }
        }
        Ok(BufferedBody::Complete(buffered))
    }

    /// Read and discard a blocked upload, bounded by time and bytes.
    async fn drain(&self, mut stream: BodyDataStream) {
        let limit = self.options.max_drain_bytes;
        let drain = async {
            let mut read: u64 = 0;
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        read += bytes.len() as u64;
                        if read > limit {
                            return false;
                        }
                    }
                    Err(_) => return false,
                }
            }
            true
        };

        match tokio::time::timeout(self.options.drain_timeout, drain).await {
            Ok(true) => tracing::trace!(connection_id = %self.id, "Blocked request body drained"),
            Ok(false) | Err(_) => {
                tracing::debug!(connection_id = %self.id, "Blocked request body not fully drained")
            }
        }
    }

    async fn forward(&self, inbound: InboundRequest, body: Body) -> Result<Response<Body>, ProxyError> {
        let Some(target) = inbound.target() else {
            return self.resolution_failed("request names no target host");
        };

        let mut upstream = self.upstream.lock().await;
        let mut attempts = 0;
        loop {
            attempts += 1;

            let choice = match self.coordinator.select_upstream(self.id, &target) {
                Ok(choice) => choice,
                Err(e) => return self.resolution_failed(&e.to_string()),
            };
            let address = match resolve(&choice.address).await {
                Ok(address) => address,
                Err(e) => return self.resolution_failed(&format!("{}: {e}", choice.address)),
            };
            self.coordinator
                .on_resolution_succeeded(self.id, choice.binding.clone(), address);

            let reusable = upstream.as_ref().is_some_and(|u| {
                u.address == choice.address && !u.sender.is_closed()
            });
            if reusable {
                break;
            }

            match self.connect(&choice.address, address).await {
                Ok(connection) => {
                    // Arm the new leg before the old one is dropped.
                    self.coordinator.on_request_sending(self.id, connection.leg);
                    *upstream = Some(connection);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %self.id,
                        upstream = %choice.address,
                        attempt = attempts,
                        error = %e,
                        "Upstream connect failed"
                    );
                    self.coordinator.on_connect_failed(self.id);
                    if attempts >= self.options.max_connect_attempts {
                        metrics::record_synthetic_response(502);
                        return Ok(TerminalResponse::bad_gateway(&inbound.summary()).into_response());
                    }
                }
            }
        }

        let Some(connection) = upstream.as_mut() else {
            return Ok(TerminalResponse::bad_gateway(&inbound.summary()).into_response());
        };
        self.coordinator.on_request_sending(self.id, connection.leg);

        let summary = inbound.summary();
        let request = upstream_request(inbound, body, self.peer);
        let sent = match connection.sender.ready().await {
            Ok(()) => connection.sender.send_request(request).await,
            Err(e) => Err(e),
        };
        let response = match sent {
            Ok(response) => response.map(Body::new),
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.id,
                    upstream = %connection.address,
                    error = %e,
                    "Upstream request failed"
                );
                *upstream = None;
                metrics::record_synthetic_response(502);
                return Ok(TerminalResponse::bad_gateway(&summary).into_response());
            }
        };

        Ok(self.coordinator.on_server_response(self.id, response))
    }

    async fn connect(&self, address: &HostPort, socket: SocketAddr) -> Result<UpstreamConnection, ConnectError> {
        let stream = tokio::time::timeout(self.options.connect_timeout, TcpStream::connect(socket))
            .await
            .map_err(|_| ConnectError::Timeout(self.options.connect_timeout))??;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(connection_id = %self.id, upstream = %address, error = %e, "Failed to set TCP_NODELAY");
        }

        let (sender, connection) =
            hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream)).await?;

        let mut pipeline = UpstreamPipeline::new(self.settings.max_response_buffer_bytes);
        self.coordinator.on_connect_succeeded(self.id, &mut pipeline);

        let leg = ServerLegId::next();
        let coordinator = Arc::clone(&self.coordinator);
        let id = self.id;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(connection_id = %id, leg = %leg, error = %e, "Upstream connection error");
            }
            coordinator.on_server_closed(id, leg);
        });

        tracing::debug!(connection_id = %self.id, upstream = %address, leg = %leg, "Upstream connected");
        Ok(UpstreamConnection {
            address: address.clone(),
            leg,
            sender,
        })
    }

    /// Answer with the coordinator's queued 502, or end the connection if
    /// none was queued.
    fn resolution_failed(&self, reason: &str) -> Result<Response<Body>, ProxyError> {
        if !self.coordinator.on_resolution_failed(self.id, reason) {
            return Err(ProxyError::Unresolved(reason.to_string()));
        }
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .map(TerminalResponse::into_response)
            .map_err(|_| ProxyError::Unresolved(reason.to_string()))
    }
}

async fn resolve(address: &HostPort) -> Result<SocketAddr, std::io::Error> {
    tokio::net::lookup_host(address.to_socket_string())
        .await?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"))
}

/// Turn the filtered client request into the request sent upstream.
fn upstream_request(inbound: InboundRequest, body: Body, peer: SocketAddr) -> Request<Body> {
    let target = inbound.target();
    let mut head = inbound.head;

    let origin_form = head
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    head.uri = Uri::from(origin_form);
    head.version = Version::HTTP_11;

    for name in HOP_BY_HOP {
        head.headers.remove(name);
    }

    let forwarded = match head.headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {}", peer.ip()),
        None => peer.ip().to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded) {
        head.headers.insert(X_FORWARDED_FOR.clone(), value);
    }
    ensure_request_id(&mut head.headers);

    if !head.headers.contains_key(header::HOST) {
        if let Some(value) = target.and_then(|t| HeaderValue::from_str(&t.to_socket_string()).ok()) {
            head.headers.insert(header::HOST, value);
        }
    }

    Request::from_parts(head, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::X_REQUEST_ID;

    #[test]
    fn upstream_request_is_origin_form_with_forwarding_headers() {
        let request = Request::builder()
            .uri("http://app.local:8080/a/b?c=1")
            .header("connection", "keep-alive")
            .header("x-forwarded-for", "203.0.113.9")
            .body(())
            .unwrap();
        let peer: SocketAddr = "192.0.2.10:5000".parse().unwrap();
        let (inbound, _) = InboundRequest::from_request(request, peer);

        let upstream = upstream_request(inbound, Body::empty(), peer);
        assert_eq!(upstream.uri(), "/a/b?c=1");
        assert_eq!(upstream.headers()[header::HOST], "app.local:8080");
        assert_eq!(upstream.headers()["x-forwarded-for"], "203.0.113.9, 192.0.2.10");
        assert!(upstream.headers().get(header::CONNECTION).is_none());
        assert!(upstream.headers().contains_key(&X_REQUEST_ID));
    }

    #[test]
    fn pipeline_stages_follow_buffering() {
        assert!(!UpstreamPipeline::new(0).has_stage(PipelineStage::Aggregate));

        let mut pipeline = UpstreamPipeline::new(1024);
        assert!(pipeline.has_stage(PipelineStage::Decompress));
        assert!(pipeline.remove_stage(PipelineStage::Aggregate));
        assert!(!pipeline.remove_stage(PipelineStage::Aggregate));
        assert!(pipeline.has_stage(PipelineStage::Decompress));
    }

    #[test]
    fn connect_success_leaves_no_stages() {
        let mut config = WafConfig::default();
        config.buffering.max_response_buffer_bytes = 1024;
        let server = WafServer::new(&config).unwrap();
        let coordinator = server.coordinator();
        let id = ConnectionId::next();
        let (client, _close_rx, _outbox_rx) = ClientHandle::new(1);
        coordinator.register_client(id, client);

        let mut pipeline = UpstreamPipeline::new(config.buffering.max_response_buffer_bytes);
        coordinator.on_connect_succeeded(id, &mut pipeline);
        assert!(pipeline.stages.is_empty());
    }

    #[test]
    fn client_handle_writability() {
        let (handle, mut close_rx, mut outbox_rx) = ClientHandle::new(1);
        let response = TerminalResponse::bad_gateway(&Default::default());

        assert!(handle.is_writable());
        assert!(handle.write(response.clone()));
        assert!(!handle.is_writable());
        assert!(!handle.write(response));
        assert!(outbox_rx.try_recv().is_ok());
        assert!(handle.is_writable());

        handle.close();
        assert!(!handle.is_active());
        assert!(!handle.is_writable());
        assert!(close_rx.has_changed().unwrap());
    }

    #[test]
    fn resolution_failure_on_draining_connection_is_dropped() {
        let server = WafServer::new(&WafConfig::default()).unwrap();
        let coordinator = server.coordinator();

        let live = ConnectionId::next();
        let (live_client, _live_close, mut live_outbox) = ClientHandle::new(1);
        coordinator.register_client(live, live_client);
        assert!(coordinator.on_resolution_failed(live, "no such host"));
        assert_eq!(
            live_outbox.try_recv().map(|r| r.status()).ok(),
            Some(axum::http::StatusCode::BAD_GATEWAY)
        );

        let draining = ConnectionId::next();
        let (draining_client, _draining_close, mut draining_outbox) = ClientHandle::new(1);
        coordinator.register_client(draining, draining_client.clone());
        draining_client.begin_drain();
        assert!(draining_client.is_active());
        assert!(!draining_client.is_writable());
        assert!(!coordinator.on_resolution_failed(draining, "no such host"));
        assert!(draining_outbox.try_recv().is_err());
    }

    #[test]
    fn topology_fingerprint_ignores_order() {
        use crate::config::UpstreamServerConfig;
        let group = |host: &str| UpstreamGroupConfig {
            host: host.into(),
            port: 80,
            servers: vec![UpstreamServerConfig { host: "10.0.0.1".into(), port: 80, weight: 1 }],
        };
        assert_eq!(
            topology_fingerprint(&[group("a"), group("b")]),
            topology_fingerprint(&[group("b"), group("a")])
        );
        assert_ne!(topology_fingerprint(&[group("a")]), topology_fingerprint(&[group("b")]));
    }
}

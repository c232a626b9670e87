//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use waf_proxy::config::WafConfig;
use waf_proxy::lifecycle::Shutdown;
use waf_proxy::net::Listener;
use waf_proxy::proxy::ConnectionCoordinator;
use waf_proxy::WafServer;

/// Raw requests (head and body) a mock backend received.
pub type Seen = Arc<Mutex<Vec<String>>>;

/// Start a mock backend on `listener` answering every request with `body`.
pub fn serve_backend(listener: TcpListener, body: &'static str) -> Seen {
    serve_backend_with(listener, body, true)
}

/// Like [`serve_backend`], but when `announce_close` is false the reply
/// looks keep-alive and the socket is closed right after it anyway.
pub fn serve_backend_with(listener: TcpListener, body: &'static str, announce_close: bool) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 4096];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let text = String::from_utf8_lossy(&head).into_owned();
                let head_end = text.find("\r\n\r\n").map(|i| i + 4).unwrap_or(head.len());
                let body_len = content_length(&text[..head_end]);
                while head.len() < head_end + body_len {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                log.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());

                let connection = if announce_close { "Connection: close\r\n" } else { "" };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Powered-By: mock\r\n{}\r\n{}",
                    body.len(),
                    connection,
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    seen
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Start a mock backend on an ephemeral port.
pub async fn start_backend(body: &'static str) -> (SocketAddr, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, serve_backend(listener, body))
}

/// Start a backend that drops the connection after each keep-alive reply.
pub async fn start_closing_backend(body: &'static str) -> (SocketAddr, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, serve_backend_with(listener, body, false))
}

/// Send raw request bytes and read until the proxy closes the connection.
pub async fn raw_exchange(proxy: SocketAddr, request: &[u8]) -> String {
    let mut stream = tokio::net::TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("proxy kept the client connection open")
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// A port nothing listens on.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub coordinator: Arc<ConnectionCoordinator>,
    pub updates: mpsc::UnboundedSender<WafConfig>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: WafConfig) -> TestProxy {
    let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = inner.local_addr().unwrap();
    let listener = Listener::new(inner, config.listener.max_connections);

    let server = WafServer::new(&config).unwrap();
    let coordinator = server.coordinator();
    let shutdown = Shutdown::new();
    let (updates, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, rx, shutdown.subscribe()));

    TestProxy {
        addr,
        shutdown,
        coordinator,
        updates,
        handle,
    }
}

/// Client that never pools or proxies, so every request is a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub fn base_config() -> WafConfig {
    let mut config = WafConfig::default();
    config.listener.max_connections = 64;
    config.timeouts.connect_secs = 1;
    config.timeouts.deferred_drain_secs = 2;
    config.health_check.enabled = false;
    config.observability.metrics_enabled = false;
    config
}

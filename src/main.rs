//! WAF reverse proxy.
//!
//! ```text
//!     Client ──▶ net::Listener ──▶ http::server (hyper, per connection)
//!                                       │
//!                                       ▼
//!                              proxy::ConnectionCoordinator
//!                               │                      │
//!                 pipeline::RequestPipeline     load_balancer::WeightedScheduler
//!                 (rewrite → security chain)     (healthy set, smooth WRR)
//!                               │                      │
//!                 security::VerdictCache ◀── deferred  ▼
//!                               │                  Upstream server
//!                 pipeline::ResponsePipeline ◀─────────┘
//!                               │
//!     Client ◀──────────────────┘
//!
//!  Background: config watcher (reload), health monitor (recovery probes),
//!              admin API, Prometheus exporter.
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use waf_proxy::admin::{setup_admin_router, AdminState};
use waf_proxy::config::loader::load_config;
use waf_proxy::config::watcher::ConfigWatcher;
use waf_proxy::config::WafConfig;
use waf_proxy::health::HealthMonitor;
use waf_proxy::lifecycle::{spawn_signal_handler, Shutdown};
use waf_proxy::net::Listener;
use waf_proxy::observability::{logging, metrics};
use waf_proxy::WafServer;

#[derive(Parser)]
#[command(name = "waf-proxy", version, about = "Web application firewall reverse proxy")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "WAF_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => WafConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        lb = ?config.lb,
        upstream_groups = config.upstreams.len(),
        "waf-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = WafServer::new(&config)?;
    let coordinator = server.coordinator();

    // Keep the watcher alive for the life of the process.
    let (update_tx, mut config_rx) = mpsc::unbounded_channel();
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            config_rx = rx;
            match watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    if config.health_check.enabled {
        let monitor = HealthMonitor::new(
            coordinator.scheduler().clone(),
            coordinator.settings_store().clone(),
            config.health_check.clone(),
        );
        tokio::spawn(monitor.run(shutdown.subscribe()));
    }

    if config.admin.enabled {
        if config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
            tracing::warn!("Admin API is using the default key");
        }
        let state = AdminState::new(coordinator.clone(), server.tracker(), &config.admin.api_key);
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        let admin_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let served = axum::serve(admin_listener, setup_admin_router(state))
                .with_graceful_shutdown(async move { admin_shutdown.wait().await })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let listener = Listener::bind(&config.listener).await?;
    server.run(listener, config_rx, shutdown.subscribe()).await?;

    drop(update_tx);
    tracing::info!("Shutdown complete");
    Ok(())
}

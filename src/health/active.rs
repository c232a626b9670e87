//! Active recovery probing.
//!
//! # Responsibilities
//! - Periodically probe servers the scheduler has evicted
//! - Reinstate a server after `healthy_threshold` consecutive successes
//!
//! Healthy servers are never probed; eviction is driven by connect
//! failures seen on live traffic. Probing is skipped while lb is off.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use rand::Rng;
use tokio::sync::broadcast;
use tokio::time;
use url::Url;

use crate::config::HealthCheckConfig;
use crate::load_balancer::{GroupKey, ServerKey, UpstreamServer, WeightedScheduler};
use crate::proxy::SettingsStore;

pub struct HealthMonitor {
    scheduler: Arc<WeightedScheduler>,
    settings: Arc<SettingsStore>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
    successes: Mutex<HashMap<(GroupKey, ServerKey), u32>>,
}

impl HealthMonitor {
    pub fn new(
        scheduler: Arc<WeightedScheduler>,
        settings: Arc<SettingsStore>,
        config: HealthCheckConfig,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            scheduler,
            settings,
            config,
            client,
            successes: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Recovery probing disabled");
            return;
        }

        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let jitter_ms = rand::thread_rng().gen_range(0..=interval.as_millis() as u64 / 10);
        tracing::info!(
            interval_secs = interval.as_secs(),
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(
            time::Instant::now() + Duration::from_millis(jitter_ms),
            interval,
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => self.check_all().await,
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every unhealthy server once.
    pub async fn check_all(&self) {
        if !self.settings.load().lb_enabled() {
            return;
        }

        let mut evicted = Vec::new();
        for group in self.scheduler.groups() {
            for server in group.unhealthy_servers() {
                evicted.push((group.key().clone(), server));
            }
        }

        // Forget streaks of servers that were reinstated some other way.
        self.successes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(g, s), _| evicted.iter().any(|(eg, es)| eg == g && es.key() == s));

        for (group, server) in evicted {
            let healthy = self.probe(&server).await;
            self.record(&group, server.key(), healthy);
        }
    }

    fn record(&self, group: &GroupKey, server: &ServerKey, healthy: bool) {
        let key = (group.clone(), server.clone());
        let streak = {
            let mut successes = self.successes.lock().unwrap_or_else(PoisonError::into_inner);
            if !healthy {
                successes.remove(&key);
                return;
            }
            let streak = successes.entry(key.clone()).or_insert(0);
            *streak += 1;
            *streak
        };

        if streak < self.config.healthy_threshold.max(1) {
            tracing::debug!(group = %group, server = %server, streak, "Probe succeeded");
            return;
        }

        self.successes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        if let Err(e) = self.scheduler.report_recovered(group, server) {
            tracing::warn!(group = %group, server = %server, error = %e, "Could not reinstate server");
        }
    }

    async fn probe(&self, server: &UpstreamServer) -> bool {
        let url = match Url::parse(&format!("http://{}", server.address()))
            .and_then(|base| base.join(&self.config.path))
        {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(server = %server.key(), error = %e, "Invalid probe URL");
                return false;
            }
        };

        let request = match Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("user-agent", "waf-proxy-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build probe request");
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(server = %server.key(), status = %response.status(), "Probe failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(server = %server.key(), error = %e, "Probe failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(server = %server.key(), "Probe failed: timeout");
                false
            }
        }
    }
}

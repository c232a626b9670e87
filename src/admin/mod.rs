//! Operator API: status, upstream health, manual evict and recover.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::net::ConnectionTracker;
use crate::proxy::ConnectionCoordinator;

#[derive(Clone)]
pub struct AdminState {
    pub coordinator: Arc<ConnectionCoordinator>,
    pub tracker: ConnectionTracker,
    pub api_key: Arc<str>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(coordinator: Arc<ConnectionCoordinator>, tracker: ConnectionTracker, api_key: &str) -> Self {
        Self {
            coordinator,
            tracker,
            api_key: Arc::from(api_key),
            started: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/upstreams", get(get_upstreams))
        .route("/admin/upstreams/{group}/servers/{server}/recover", post(recover_server))
        .route("/admin/upstreams/{group}/servers/{server}/evict", post(evict_server))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::WafConfig;
    use crate::config::{LbMode, UpstreamGroupConfig, UpstreamServerConfig};
    use crate::load_balancer::WeightedScheduler;
    use crate::proxy::SettingsStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> (Router, Arc<ConnectionCoordinator>) {
        let mut config = WafConfig::default();
        config.lb = LbMode::On;
        config.upstreams = vec![UpstreamGroupConfig {
            host: "app.local".into(),
            port: 80,
            servers: vec![
                UpstreamServerConfig { host: "10.0.0.1".into(), port: 8080, weight: 3 },
                UpstreamServerConfig { host: "10.0.0.2".into(), port: 8080, weight: 1 },
            ],
        }];
        let coordinator = Arc::new(ConnectionCoordinator::new(
            Arc::new(SettingsStore::new(&config).unwrap()),
            Arc::new(WeightedScheduler::new(&config.upstreams)),
        ));
        let state = AdminState::new(Arc::clone(&coordinator), ConnectionTracker::new(), "secret");
        (setup_admin_router(state), coordinator)
    }

    fn request(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        let (app, _) = router();
        let resp = app.clone().oneshot(request("GET", "/admin/status", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let resp = app.oneshot(request("GET", "/admin/status", Some("nope"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_reports_lb_and_filters() {
        let (app, _) = router();
        let resp = app.oneshot(request("GET", "/admin/status", Some("secret"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json(resp).await;
        assert_eq!(body["lb"], "on");
        assert_eq!(body["verdict_cache_capacity"], 10_000);
        assert!(body["security_filters"].as_array().unwrap().iter().any(|f| f == "body"));
    }

    #[tokio::test]
    async fn evict_and_recover_round_trip() {
        let (app, coordinator) = router();
        let group = crate::load_balancer::GroupKey::new("app.local", 80);
        let server = crate::load_balancer::ServerKey::new("10.0.0.1", 8080);

        let resp = app
            .clone()
            .oneshot(request("POST", "/admin/upstreams/app.local_80/servers/10.0.0.1:8080/evict", Some("secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let health = coordinator.scheduler().group(&group).unwrap().health_of(&server);
        assert_eq!(health.map(|h| h.is_healthy()), Some(false));

        let resp = app
            .clone()
            .oneshot(request("GET", "/admin/upstreams", Some("secret")))
            .await
            .unwrap();
        let body = json(resp).await;
        assert_eq!(body[0]["group"], "app.local_80");

        let resp = app
            .oneshot(request("POST", "/admin/upstreams/app.local_80/servers/10.0.0.1:8080/recover", Some("secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let health = coordinator.scheduler().group(&group).unwrap().health_of(&server);
        assert_eq!(health.map(|h| h.is_healthy()), Some(true));
    }

    #[tokio::test]
    async fn unknown_and_malformed_keys() {
        let (app, _) = router();
        let resp = app
            .clone()
            .oneshot(request("POST", "/admin/upstreams/other_80/servers/10.0.0.1:8080/evict", Some("secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .oneshot(request("POST", "/admin/upstreams/nounderscore/servers/10.0.0.1:8080/evict", Some("secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

//! End-to-end behavior of the filtering proxy against mock backends.

mod common;

use std::time::Duration;

use reqwest::{header, StatusCode};
use waf_proxy::config::schema::{RewriteRuleConfig, RuleConfig, RuleTargetConfig};
use waf_proxy::config::{LbMode, UpstreamGroupConfig, UpstreamServerConfig};
use waf_proxy::load_balancer::{GroupKey, ServerKey};

use common::{base_config, client, raw_exchange, start_backend, start_closing_backend, start_proxy};

#[tokio::test]
async fn allowed_request_is_forwarded_with_forwarding_headers() {
    let (backend, seen) = start_backend("hello").await;
    let proxy = start_proxy(base_config()).await;

    let response = client()
        .get(proxy.url("/greeting?lang=en"))
        .header(header::HOST, backend.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "hello");

    let requests = seen.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let head = requests[0].to_ascii_lowercase();
    assert!(head.starts_with("get /greeting?lang=en http/1.1"));
    assert!(head.contains("x-forwarded-for: 127.0.0.1"));
    assert!(head.contains("x-request-id: "));

    proxy.stop().await;
}

#[tokio::test]
async fn generic_block_answers_403_with_cors_and_close() {
    let (backend, seen) = start_backend("secret").await;
    let mut config = base_config();
    config.security.rules.push(RuleConfig {
        name: "no-admin".into(),
        target: RuleTargetConfig::Path,
        header: None,
        pattern: "^/admin".into(),
    });
    let proxy = start_proxy(config).await;

    let response = client()
        .get(proxy.url("/admin/panel"))
        .header(header::HOST, backend.to_string())
        .header(header::ORIGIN, "https://app.example")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[header::CONNECTION], "close");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(response.text().await.unwrap().is_empty());
    assert!(seen.lock().unwrap().is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn rate_limited_client_gets_503() {
    let (backend, _seen) = start_backend("ok").await;
    let mut config = base_config();
    config.security.rate_limit.enabled = true;
    config.security.rate_limit.requests_per_second = 1;
    config.security.rate_limit.burst_size = 1;
    let proxy = start_proxy(config).await;
    let client = client();

    let first = client
        .get(proxy.url("/"))
        .header(header::HOST, backend.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = client
        .get(proxy.url("/"))
        .header(header::HOST, backend.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(second.headers()[header::CONNECTION], "close");

    proxy.stop().await;
}

#[tokio::test]
async fn oversized_upload_is_drained_then_blocked() {
    let (backend, seen) = start_backend("stored").await;
    let mut config = base_config();
    config.security.body.max_body_bytes = 16;
    let proxy = start_proxy(config).await;

    let response = client()
        .post(proxy.url("/upload"))
        .header(header::HOST, backend.to_string())
        .body(vec![b'x'; 1024])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[header::CONNECTION], "close");
    assert!(seen.lock().unwrap().is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn chunked_upload_over_limit_is_blocked() {
    let (backend, seen) = start_backend("stored").await;
    let mut config = base_config();
    config.security.body.max_body_bytes = 16;
    let proxy = start_proxy(config).await;

    let request = format!(
        "POST /upload HTTP/1.1\r\nHost: {backend}\r\nOrigin: https://app.example\r\nTransfer-Encoding: chunked\r\n\r\n40\r\n{}\r\n0\r\n\r\n",
        "x".repeat(64)
    );
    let response = raw_exchange(proxy.addr, request.as_bytes()).await;

    assert!(response.starts_with("HTTP/1.1 403"), "{response}");
    assert!(response.to_ascii_lowercase().contains("access-control-allow-origin: https://app.example"));
    assert!(seen.lock().unwrap().is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn chunked_upload_within_limit_is_forwarded_with_length() {
    let (backend, seen) = start_backend("stored").await;
    let mut config = base_config();
    config.security.body.max_body_bytes = 16;
    let proxy = start_proxy(config).await;

    let request = format!(
        "POST /upload HTTP/1.1\r\nHost: {backend}\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n"
    );
    let response = raw_exchange(proxy.addr, request.as_bytes()).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("stored"));

    let requests = seen.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let forwarded = requests[0].to_ascii_lowercase();
    assert!(forwarded.contains("content-length: 5"));
    assert!(!forwarded.contains("transfer-encoding"));
    assert!(forwarded.ends_with("\r\n\r\nhello"));

    proxy.stop().await;
}

#[tokio::test]
async fn upstream_close_closes_the_client_connection() {
    let (backend, _seen) = start_closing_backend("bye").await;
    let proxy = start_proxy(base_config()).await;

    // The reply announces keep-alive, so only the upstream close can end
    // the client connection.
    let request = format!("GET /session HTTP/1.1\r\nHost: {backend}\r\n\r\n");
    let response = raw_exchange(proxy.addr, request.as_bytes()).await;

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("bye"));

    for _ in 0..50 {
        if proxy.coordinator.active_pairs() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(proxy.coordinator.active_pairs(), 0);

    proxy.stop().await;
}

#[tokio::test]
async fn rewritten_path_reaches_backend() {
    let (backend, seen) = start_backend("moved").await;
    let mut config = base_config();
    config.rewrite.push(RewriteRuleConfig {
        path_pattern: Some("^/old/(.*)$".into()),
        replacement: "/new/$1".into(),
        ..Default::default()
    });
    let proxy = start_proxy(config).await;

    let response = client()
        .get(proxy.url("/old/page"))
        .header(header::HOST, backend.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = seen.lock().unwrap().clone();
    assert!(requests[0].starts_with("GET /new/page HTTP/1.1"));

    proxy.stop().await;
}

#[tokio::test]
async fn group_without_healthy_servers_answers_502() {
    let (backend, seen) = start_backend("unused").await;
    let mut config = base_config();
    config.lb = LbMode::On;
    config.upstreams.push(UpstreamGroupConfig {
        host: "app.local".into(),
        port: 80,
        servers: vec![UpstreamServerConfig {
            host: "127.0.0.1".into(),
            port: backend.port(),
            weight: 1,
        }],
    });
    let proxy = start_proxy(config).await;

    proxy
        .coordinator
        .scheduler()
        .report_failure(
            &GroupKey::new("app.local", 80),
            &ServerKey::new("127.0.0.1", backend.port()),
        )
        .unwrap();

    let response = client()
        .get(proxy.url("/"))
        .header(header::HOST, "app.local")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(seen.lock().unwrap().is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn reload_swaps_filters_for_new_connections() {
    let (backend, _seen) = start_backend("ok").await;
    let proxy = start_proxy(base_config()).await;
    let client = client();

    let before = client
        .get(proxy.url("/blocked"))
        .header(header::HOST, backend.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(before.status(), StatusCode::OK);

    let mut reloaded = base_config();
    reloaded.security.rules.push(RuleConfig {
        name: "blocked-path".into(),
        target: RuleTargetConfig::Path,
        header: None,
        pattern: "^/blocked$".into(),
    });
    proxy.updates.send(reloaded).unwrap();

    let mut status = StatusCode::OK;
    for _ in 0..50 {
        status = client
            .get(proxy.url("/blocked"))
            .header(header::HOST, backend.to_string())
            .send()
            .await
            .unwrap()
            .status();
        if status == StatusCode::FORBIDDEN {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, StatusCode::FORBIDDEN);

    proxy.stop().await;
}

#[tokio::test]
async fn shutdown_stops_the_server() {
    let proxy = start_proxy(base_config()).await;
    proxy.shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), proxy.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

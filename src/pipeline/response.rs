//! Response pipeline: deferred verdict replay and response filters.

use std::sync::Arc;

use axum::{body::Body, http::Response};
use thiserror::Error;

use crate::http::request::RequestSummary;
use crate::net::ConnectionId;
use crate::security::VerdictCache;

#[derive(Debug, Error)]
#[error("response filter {filter} failed: {reason}")]
pub struct ResponseFilterError {
    pub filter: String,
    pub reason: String,
}

/// Filter applied to upstream responses.
pub trait ResponseFilter: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &str;

    fn apply(
        &self,
        request: &RequestSummary,
        response: &mut Response<Body>,
    ) -> Result<(), ResponseFilterError>;
}

#[derive(Debug)]
pub struct ResponsePipeline {
    filters: Vec<Arc<dyn ResponseFilter>>,
    cache: Arc<VerdictCache>,
}

impl ResponsePipeline {
    pub fn new(filters: Vec<Arc<dyn ResponseFilter>>, cache: Arc<VerdictCache>) -> Self {
        Self { filters, cache }
    }

    /// Produce the response the client receives.
    ///
    /// A cached verdict for `id` replaces `response` and is consumed. Otherwise
    /// filters run in order; the first filter error stops them and the
    /// response goes out as it stands.
    pub fn on_response(
        &self,
        id: ConnectionId,
        request: &RequestSummary,
        mut response: Response<Body>,
    ) -> Response<Body> {
        if let Some(verdict) = self.cache.take(id) {
            tracing::debug!(
                connection_id = %id,
                status = verdict.status().as_u16(),
                discarded_status = response.status().as_u16(),
                "Replaying deferred verdict"
            );
            return verdict.into_response();
        }

        for filter in &self.filters {
            if let Err(e) = filter.apply(request, &mut response) {
                tracing::warn!(
                    connection_id = %id,
                    filter = filter.id(),
                    error = %e,
                    "Response filter failed, passing response through"
                );
                break;
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::TerminalResponse;
    use axum::http::{HeaderValue, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Tagging {
        calls: AtomicUsize,
    }

    impl ResponseFilter for Tagging {
        fn id(&self) -> &str {
            "tagging"
        }

        fn apply(&self, _: &RequestSummary, response: &mut Response<Body>) -> Result<(), ResponseFilterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            response.headers_mut().insert("x-filtered", HeaderValue::from_static("1"));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl ResponseFilter for Failing {
        fn id(&self) -> &str {
            "failing"
        }

        fn apply(&self, _: &RequestSummary, _: &mut Response<Body>) -> Result<(), ResponseFilterError> {
            Err(ResponseFilterError {
                filter: "failing".into(),
                reason: "scripted".into(),
            })
        }
    }

    fn upstream_ok() -> Response<Body> {
        Response::builder().status(200).body(Body::from("hello")).unwrap()
    }

    #[test]
    fn deferred_verdict_replays_exactly_once() {
        let cache = Arc::new(VerdictCache::new(4));
        let tagging = Arc::new(Tagging::default());
        let pipeline = ResponsePipeline::new(vec![tagging.clone()], Arc::clone(&cache));
        let id = ConnectionId::from(3);
        let summary = RequestSummary::default();

        cache.insert(id, TerminalResponse::for_request(StatusCode::FORBIDDEN, &summary));

        let first = pipeline.on_response(id, &summary, upstream_ok());
        assert_eq!(first.status(), StatusCode::FORBIDDEN);
        assert_eq!(tagging.calls.load(Ordering::SeqCst), 0);

        let second = pipeline.on_response(id, &summary, upstream_ok());
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()["x-filtered"], "1");
        assert!(cache.is_empty());
    }

    #[test]
    fn filter_error_passes_response_through() {
        let tagging = Arc::new(Tagging::default());
        let pipeline = ResponsePipeline::new(
            vec![Arc::new(Failing), tagging.clone()],
            Arc::new(VerdictCache::new(4)),
        );
        let resp = pipeline.on_response(ConnectionId::from(1), &RequestSummary::default(), upstream_ok());
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("x-filtered").is_none());
        assert_eq!(tagging.calls.load(Ordering::SeqCst), 0);
    }
}

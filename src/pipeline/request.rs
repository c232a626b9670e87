//! Request pipeline: rewrite, then the security chain.

use std::sync::Arc;

use axum::http::StatusCode;

use crate::http::request::{InboundRequest, RequestSummary};
use crate::http::response::TerminalResponse;
use crate::http::rewrite::RewriteFilter;
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::security::chain::SecurityFilterChain;
use crate::security::limits::{carries_body, BodySizeFilter};
use crate::security::{SecurityVerdict, VerdictCache};

/// What the host engine must do with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send the request upstream.
    Forward,
    /// Answer immediately with this response.
    RespondNow(TerminalResponse),
    /// Read the request body, then answer with this response. It is also
    /// held in the verdict cache under the connection's id.
    DeferredBlock(TerminalResponse),
}

#[derive(Debug)]
pub struct RequestPipeline {
    rewrite: Arc<dyn RewriteFilter>,
    chain: SecurityFilterChain,
    cache: Arc<VerdictCache>,
    /// Byte limit for bodies whose length is not declared up front.
    streamed_body_limit: Option<u64>,
}

impl RequestPipeline {
    pub fn new(
        rewrite: Arc<dyn RewriteFilter>,
        chain: SecurityFilterChain,
        cache: Arc<VerdictCache>,
    ) -> Self {
        Self {
            rewrite,
            chain,
            cache,
            streamed_body_limit: None,
        }
    }

    /// Enforce the body policy on chunked uploads while they are read.
    pub fn with_streamed_body_limit(mut self, limit: Option<u64>) -> Self {
        self.streamed_body_limit = limit;
        self
    }

    pub fn chain(&self) -> &SecurityFilterChain {
        &self.chain
    }

    /// The limit the engine must count a forwarded body against, if any.
    ///
    /// Declared lengths are judged by the chain; only chunked uploads on
    /// body-carrying methods are left to the engine.
    pub fn streamed_body_limit(&self, request: &InboundRequest) -> Option<u64> {
        let limit = self.streamed_body_limit?;
        let is_unsized = request.declared_body_len().is_none() && request.is_chunked();
        (is_unsized && carries_body(request.method())).then_some(limit)
    }

    /// Record a body-policy block found while reading the body.
    pub fn defer_body_block(&self, id: ConnectionId, request: &RequestSummary) -> TerminalResponse {
        let verdict = SecurityVerdict::BlockBodyPolicy;
        let status = verdict.status().unwrap_or(StatusCode::FORBIDDEN);
        metrics::record_verdict(verdict.label(), BodySizeFilter::ID);
        metrics::record_synthetic_response(status.as_u16());
        tracing::info!(
            connection_id = %id,
            verdict = %verdict,
            filter = BodySizeFilter::ID,
            method = %request.method,
            path = %request.uri.path(),
            "Streamed body over limit, request blocked"
        );

        let response = TerminalResponse::for_request(status, request);
        self.cache.insert(id, response.clone());
        response
    }

    /// Decide what happens to `request`. Rewrite changes are applied in place.
    pub fn on_request(&self, id: ConnectionId, request: &mut InboundRequest) -> Action {
        if let Err(e) = self.rewrite.rewrite(request) {
            tracing::warn!(
                connection_id = %id,
                path = %request.path(),
                error = %e,
                "Rewrite failed"
            );
            return Self::respond_now(StatusCode::BAD_GATEWAY, request);
        }

        let decision = match self.chain.evaluate(request) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(
                    connection_id = %id,
                    filter = %e.filter,
                    error = %e.source,
                    "Security filter failed, blocking request"
                );
                return Self::respond_now(StatusCode::BAD_GATEWAY, request);
            }
        };

        let Some(status) = decision.verdict.status() else {
            return Action::Forward;
        };

        let filter = decision.filter.as_deref().unwrap_or("unknown");
        metrics::record_verdict(decision.verdict.label(), filter);
        tracing::info!(
            connection_id = %id,
            verdict = %decision.verdict,
            filter = filter,
            client = %request.client_ip(),
            method = %request.method(),
            path = %request.path(),
            "Request blocked"
        );

        let response = TerminalResponse::for_request(status, &request.summary());
        metrics::record_synthetic_response(status.as_u16());
        match decision.verdict {
            SecurityVerdict::BlockBodyPolicy => {
                self.cache.insert(id, response.clone());
                Action::DeferredBlock(response)
            }
            _ => Action::RespondNow(response),
        }
    }

    fn respond_now(status: StatusCode, request: &InboundRequest) -> Action {
        metrics::record_synthetic_response(status.as_u16());
        Action::RespondNow(TerminalResponse::for_request(status, &request.summary()))
    }
}

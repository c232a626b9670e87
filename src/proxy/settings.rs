//! Runtime settings snapshot.
//!
//! Everything a reload may change lives in one immutable [`Settings`]
//! value behind an `ArcSwap`. Connections capture the current snapshot when
//! they are registered and keep it until they close, so a reload never
//! changes the rules halfway through a connection.

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::config::schema::WafConfig;
use crate::config::LbMode;
use crate::http::rewrite::{RewriteFilter, RuleRewriter};
use crate::pipeline::request::RequestPipeline;
use crate::pipeline::response::{ResponseFilter, ResponsePipeline};
use crate::security::chain::SecurityFilterChain;
use crate::security::headers::{FrameOptionsFilter, HeaderPolicyFilter};
use crate::security::limits::BodySizeFilter;
use crate::security::VerdictCache;

/// Config that passed validation but could not be turned into filters.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid pattern in {context}: {source}")]
    InvalidPattern {
        context: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid IP address {0:?}")]
    InvalidIp(String),

    #[error("unknown security filter {0:?}")]
    UnknownFilter(String),

    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    #[error("invalid address for {field}: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// One consistent view of the reloadable configuration.
#[derive(Debug)]
pub struct Settings {
    pub lb: LbMode,
    pub request: RequestPipeline,
    pub response: ResponsePipeline,
    /// Non-zero installs buffering stages on the server leg.
    pub max_response_buffer_bytes: usize,
}

impl Settings {
    pub fn from_config(config: &WafConfig, cache: Arc<VerdictCache>) -> Result<Self, BuildError> {
        let rewriter = RuleRewriter::from_config(&config.rewrite).map_err(|source| {
            BuildError::InvalidPattern {
                context: "rewrite rule".to_string(),
                source,
            }
        })?;
        let rewrite: Arc<dyn RewriteFilter> = Arc::new(rewriter);
        let chain = SecurityFilterChain::from_config(&config.security)?;
        let streamed_body_limit = chain
            .filter_ids()
            .iter()
            .any(|id| id == BodySizeFilter::ID)
            .then_some(config.security.body.max_body_bytes);

        let mut response_filters: Vec<Arc<dyn ResponseFilter>> = Vec::new();
        let policy = HeaderPolicyFilter::from_config(&config.response_headers)?;
        if !policy.is_empty() {
            response_filters.push(Arc::new(policy));
        }
        if let Some(frame_options) = &config.response_headers.frame_options {
            response_filters.push(Arc::new(FrameOptionsFilter::new(frame_options)?));
        }

        Ok(Self {
            lb: config.lb,
            request: RequestPipeline::new(rewrite, chain, Arc::clone(&cache))
                .with_streamed_body_limit(streamed_body_limit),
            response: ResponsePipeline::new(response_filters, cache),
            max_response_buffer_bytes: config.buffering.max_response_buffer_bytes,
        })
    }

    pub fn lb_enabled(&self) -> bool {
        self.lb.is_enabled()
    }
}

/// Holds the current snapshot and the verdict cache every snapshot shares.
#[derive(Debug)]
pub struct SettingsStore {
    current: ArcSwap<Settings>,
    cache: Arc<VerdictCache>,
}

impl SettingsStore {
    pub fn new(config: &WafConfig) -> Result<Self, BuildError> {
        let cache = Arc::new(VerdictCache::new(config.verdict_cache.capacity));
        let settings = Settings::from_config(config, Arc::clone(&cache))?;
        Ok(Self {
            current: ArcSwap::from_pointee(settings),
            cache,
        })
    }

    pub fn load(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Build a snapshot from `config` and publish it for new connections.
    ///
    /// On error the previous snapshot stays in place.
    pub fn reload(&self, config: &WafConfig) -> Result<(), BuildError> {
        let settings = Settings::from_config(config, Arc::clone(&self.cache))?;
        self.current.store(Arc::new(settings));
        tracing::info!(lb = ?config.lb, "Settings reloaded");
        Ok(())
    }

    pub fn verdict_cache(&self) -> &Arc<VerdictCache> {
        &self.cache
    }
}

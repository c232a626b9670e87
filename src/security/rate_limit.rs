//! CC protection: per-client-IP token buckets.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::config::schema::RateLimitConfig;
use crate::http::request::InboundRequest;
use crate::security::filter::{FilterError, SecurityFilter};
use crate::security::verdict::SecurityVerdict;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// True once the bucket would have refilled completely.
    fn is_idle(&self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }
}

/// Blocks clients whose request rate exceeds `requests_per_second` with
/// bursts up to `burst_size`.
#[derive(Debug)]
pub struct CcFilter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    rate: f64,
    burst: f64,
    max_tracked_clients: usize,
}

impl CcFilter {
    pub const ID: &'static str = "cc";

    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate: f64::from(config.requests_per_second.max(1)),
            burst: f64::from(config.burst_size.max(1)),
            max_tracked_clients: config.max_tracked_clients.max(1),
        }
    }

    /// Take one token for `client`. Returns false when the client is over its limit.
    fn admit(&self, client: IpAddr, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        if buckets.len() >= self.max_tracked_clients && !buckets.contains_key(&client) {
            let before = buckets.len();
            buckets.retain(|_, bucket| !bucket.is_idle(self.burst, self.rate, now));
            tracing::debug!(
                pruned = before - buckets.len(),
                tracked = buckets.len(),
                "Pruned idle rate limit buckets"
            );
        }

        buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.burst, now))
            .try_acquire(self.burst, self.rate, now)
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl SecurityFilter for CcFilter {
    fn id(&self) -> &str {
        Self::ID
    }

    fn verdict(&self) -> SecurityVerdict {
        SecurityVerdict::BlockRateLimited
    }

    fn matches(&self, request: &InboundRequest) -> Result<bool, FilterError> {
        let client = request.client_ip();
        let admitted = self.admit(client, Instant::now());
        if !admitted {
            tracing::debug!(client = %client, "Rate limit exceeded");
        }
        Ok(!admitted)
    }
}

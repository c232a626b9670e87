//! Bounded store of deferred verdict responses.
//!
//! A body-phase block is decided while the request head is processed, but
//! the client is answered only after the body was read. The response waits
//! here, keyed by connection, and is consumed by the first response that
//! passes through the response pipeline for that connection.
//!
//! One mutex covers the LRU map, so the capacity bound holds under
//! concurrent inserts. Entries are only ever read by removing them, so the
//! least recently used entry is the oldest one. When full, it is evicted;
//! its connection will then be answered by the placeholder instead.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;

use crate::http::response::TerminalResponse;
use crate::net::ConnectionId;
use crate::observability::metrics;

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct VerdictCache {
    inner: Mutex<LruCache<ConnectionId, TerminalResponse>>,
}

impl Default for VerdictCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl VerdictCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<ConnectionId, TerminalResponse>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `response` for `id`, replacing any previous entry for it.
    pub fn insert(&self, id: ConnectionId, response: TerminalResponse) {
        let mut inner = self.lock();
        if let Some((evicted, _)) = inner.push(id, response) {
            if evicted != id {
                metrics::record_verdict_cache_eviction();
                tracing::warn!(
                    connection_id = %evicted,
                    capacity = inner.cap().get(),
                    "Verdict cache full, evicted oldest deferred verdict"
                );
            }
        }
        metrics::record_verdict_cache_size(inner.len());
    }

    /// Remove and return the entry for `id`.
    pub fn take(&self, id: ConnectionId) -> Option<TerminalResponse> {
        let mut inner = self.lock();
        let response = inner.pop(&id)?;
        metrics::record_verdict_cache_size(inner.len());
        Some(response)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

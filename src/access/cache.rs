//! Time-bounded cache of allow/deny verdicts.
//!
//! # Responsibilities
//! - Map client identity → verdict with an absolute expiry
//! - Never hand out a verdict past its expiry
//! - Reclaim expired entries from a periodic background sweep
//!
//! # Design Decisions
//! - Reader/writer lock: lookups share, writes and sweeps are exclusive
//! - Expiry is checked on read; the sweep only reclaims memory
//! - Instants come from the tokio clock so tests can pause and advance time

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::observability::metrics;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    allowed: bool,
    expires_at: Instant,
}

/// Shared verdict cache keyed by client identity.
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached verdict for `client`, or `None` if absent or expired.
    pub fn get(&self, client: &str) -> Option<bool> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(client)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.allowed)
    }

    /// Store a verdict valid for `ttl` from now, replacing any previous one.
    pub fn put(&self, client: &str, allowed: bool, ttl: Duration) {
        let entry = CacheEntry {
            allowed,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(client.to_string(), entry);
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        metrics::record_cache_size(entries.len());
        removed
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep every `period` until shutdown. The first sweep runs one period
    /// after start.
    pub async fn run_sweeper(self: Arc<Self>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(period_secs = period.as_secs(), "Cache sweeper starting");
        let mut ticker = time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Swept expired verdicts");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

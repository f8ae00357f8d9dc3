//! Per-request access decision.
//!
//! # State Machine
//! ```text
//! identity
//!     → internal network?  ── yes → Admit (Internal)
//!     → fresh cache entry? ── yes → Admit/Deny (Cache)
//!     → store lookup (bounded)
//!         ├─ error → Err (caller denies and tears the process down)
//!         └─ ok    → cache write-back → Admit/Deny (Store)
//! ```
//!
//! # Design Decisions
//! - No retries: a failed lookup is returned to the caller as-is
//! - Failed lookups are never cached
//! - Concurrent misses for one address are not coalesced; last write wins

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::access::cache::DecisionCache;
use crate::access::classifier::is_internal;
use crate::access::store::{MembershipStore, StoreError, StoreResult};
use crate::config::GateConfig;
use crate::observability::metrics;

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Loopback or private network, allow-list not consulted.
    Internal,
    /// Fresh verdict from the local cache.
    Cache,
    /// Verdict fetched from the membership store.
    Store,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Internal => "internal",
            DecisionSource::Cache => "cache",
            DecisionSource::Store => "store",
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub source: DecisionSource,
}

impl Decision {
    fn new(allowed: bool, source: DecisionSource) -> Self {
        Self { allowed, source }
    }
}

/// Decides whether a client identity may reach the upstream.
pub struct Gatekeeper {
    store: Arc<dyn MembershipStore>,
    cache: Arc<DecisionCache>,
    ttl: Duration,
    lookup_timeout: Duration,
}

impl Gatekeeper {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        cache: Arc<DecisionCache>,
        ttl: Duration,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            ttl,
            lookup_timeout,
        }
    }

    /// Build with the TTL and lookup deadline from configuration.
    pub fn from_config(
        store: Arc<dyn MembershipStore>,
        cache: Arc<DecisionCache>,
        config: &GateConfig,
    ) -> Self {
        Self::new(store, cache, config.cache.ttl(), config.store.lookup_timeout())
    }

    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    /// Decide for `client`. An error means the store could not answer.
    pub async fn check(&self, client: &str) -> StoreResult<Decision> {
        if is_internal(client) {
            metrics::record_decision(true, DecisionSource::Internal.as_str());
            return Ok(Decision::new(true, DecisionSource::Internal));
        }

        if let Some(allowed) = self.cache.get(client) {
            metrics::record_decision(allowed, DecisionSource::Cache.as_str());
            return Ok(Decision::new(allowed, DecisionSource::Cache));
        }

        let allowed = self.lookup(client).await?;
        self.cache.put(client, allowed, self.ttl);
        metrics::record_decision(allowed, DecisionSource::Store.as_str());
        Ok(Decision::new(allowed, DecisionSource::Store))
    }

    async fn lookup(&self, client: &str) -> StoreResult<bool> {
        let start = Instant::now();
        let result = match timeout(self.lookup_timeout, self.store.is_member(client)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.lookup_timeout)),
        };
        metrics::record_store_lookup(lookup_label(&result), start);
        result
    }
}

fn lookup_label(result: &StoreResult<bool>) -> &'static str {
    match result {
        Ok(true) => "member",
        Ok(false) => "non_member",
        Err(StoreError::Timeout(_)) => "timeout",
        Err(_) => "error",
    }
}

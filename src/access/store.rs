//! Remote allow-list membership.
//!
//! # Responsibilities
//! - Answer "is this address in the allow-list set?"
//! - Verify connectivity at startup (PING)
//!
//! # Design Decisions
//! - The store is a trait so the gatekeeper can run against Redis or an
//!   in-process set
//! - Lookup deadlines are applied by the caller, which owns the request's
//!   lifetime; dropping the lookup future cancels it
//! - Connection loss is surfaced as an error, never as "not a member"

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::time::timeout;

/// Errors raised by a membership store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection URL could not be understood.
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),

    /// The store could not be reached.
    #[error("Store connection failed: {0}")]
    Connect(String),

    /// The operation did not finish before its deadline.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with an error.
    #[error("Store command failed: {0}")]
    Command(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A remote set of allowed client addresses.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Whether `address` is a member of the allow-list.
    async fn is_member(&self, address: &str) -> StoreResult<bool>;

    /// Check connectivity.
    async fn ping(&self) -> StoreResult<()>;
}

/// Redis-backed allow-list stored as a set.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    set_key: String,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with PING, all within
    /// `connect_timeout`.
    pub async fn connect(url: &str, set_key: &str, connect_timeout: Duration) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;

        let manager = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))?
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let store = Self {
            manager,
            set_key: set_key.to_string(),
        };

        timeout(connect_timeout, store.ping())
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))??;

        tracing::info!(set_key = %store.set_key, "Connected to Redis");
        Ok(store)
    }
}

#[async_trait]
impl MembershipStore for RedisStore {
    async fn is_member(&self, address: &str) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        conn.sismember::<_, _, bool>(&self.set_key, address)
            .await
            .map_err(|e| StoreError::Command(format!("SISMEMBER {}: {}", self.set_key, e)))
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Connect(format!("PING: {}", e)))
    }
}

/// In-process allow-list. Counts lookups so callers can observe cache hits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    members: RwLock<HashSet<String>>,
    lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: RwLock::new(members.into_iter().map(Into::into).collect()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, address: impl Into<String>) {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.into());
    }

    pub fn remove(&self, address: &str) {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(address);
    }

    /// Number of `is_member` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn is_member(&self, address: &str) -> StoreResult<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(address))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_membership() {
        let store = MemoryStore::new(["203.0.113.5"]);
        assert!(store.is_member("203.0.113.5").await.unwrap());
        assert!(!store.is_member("203.0.113.9").await.unwrap());

        store.insert("203.0.113.9");
        store.remove("203.0.113.5");
        assert!(store.is_member("203.0.113.9").await.unwrap());
        assert!(!store.is_member("203.0.113.5").await.unwrap());
        assert_eq!(store.lookups(), 4);
    }

    #[tokio::test]
    async fn redis_rejects_invalid_url() {
        let result = RedisStore::connect("not a url", "ip-allowed", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(StoreError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn redis_unreachable_fails_at_connect() {
        // Port 1 is reserved and closed on test hosts.
        let result = RedisStore::connect("redis://127.0.0.1:1", "ip-allowed", Duration::from_secs(2)).await;
        assert!(matches!(
            result,
            Err(StoreError::Connect(_)) | Err(StoreError::Timeout(_))
        ));
    }

    #[test]
    fn error_display() {
        let err = StoreError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "Store operation timed out after 2s");
    }
}

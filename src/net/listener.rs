//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to configured address
//! - Accept incoming TCP connections, one task per connection
//! - Graceful handling of accept errors
//! - Stop accepting on shutdown and drain open connections

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::net::connection::{serve_connection, ConnectionTracker};

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// The configured address is not a socket address.
    Address(String),
    /// Failed to bind to address.
    Bind(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Address(addr) => write!(f, "Invalid listen address: {}", addr),
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A TCP listener serving the gatekeeper router.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Active connection bookkeeping.
    tracker: ConnectionTracker,
}

impl Listener {
    /// Bind to `address`, resolving a hostname to its first address.
    pub async fn bind(address: &str) -> Result<Self, ListenerError> {
        let addr = tokio::net::lookup_host(address)
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ListenerError::Address(address.to_string()))?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_tcp(listener))
    }

    /// Wrap an already bound listener.
    pub fn from_tcp(listener: TcpListener) -> Self {
        Self {
            inner: listener,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept and serve connections until shutdown, then wait up to `grace`
    /// for open connections to finish.
    pub async fn serve(self, router: Router, mut shutdown: broadcast::Receiver<()>, grace: Duration) {
        loop {
            tokio::select! {
                accepted = self.inner.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let _ = stream.set_nodelay(true);
                        let guard = self.tracker.track();
                        tracing::debug!(
                            peer_addr = %peer,
                            connection_id = %guard.id(),
                            "Connection accepted"
                        );
                        tokio::spawn(serve_connection(
                            stream,
                            peer,
                            router.clone(),
                            guard,
                            shutdown.resubscribe(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Listener stopping");
                    break;
                }
            }
        }

        drop(self.inner);
        let open = self.tracker.active_count();
        if open > 0 {
            tracing::info!(open_connections = open, "Draining connections");
            if !self.tracker.wait_idle(grace).await {
                tracing::warn!(
                    open_connections = self.tracker.active_count(),
                    "Connections still open after grace period"
                );
            }
        }
    }
}

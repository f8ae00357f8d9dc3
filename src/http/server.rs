//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: gate middleware in front of a catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Hand the router to the connection layer

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::header::{InvalidHeaderName, InvalidHeaderValue},
    middleware, Router,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::access::{ClientIdentity, DenialPolicy, Gatekeeper};
use crate::config::GateConfig;
use crate::http::forward::{proxy_handler, Forwarder, Upstream, UpstreamError};
use crate::http::middleware::{gate_middleware, GateState};
use crate::http::request::MakeRequestUuid;
use crate::lifecycle::shutdown::ExitHandle;
use crate::net::Listener;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("Invalid client IP header: {0}")]
    ClientIpHeader(#[from] InvalidHeaderName),
    #[error("Invalid redirect URL: {0}")]
    Redirect(#[from] InvalidHeaderValue),
}

/// The gatekeeping reverse proxy server.
pub struct GateServer {
    router: Router,
    config: GateConfig,
}

impl GateServer {
    pub fn new(
        config: GateConfig,
        gatekeeper: Arc<Gatekeeper>,
        exits: ExitHandle,
    ) -> Result<Self, ServerError> {
        let forwarder = Forwarder::new(Upstream::parse(&config.upstream.target)?)?;
        let gate = GateState {
            gatekeeper,
            identity: ClientIdentity::from_header_name(&config.access.client_ip_header)?,
            denial: DenialPolicy::from_redirect_url(&config.access.redirect_url)?,
            exits,
        };

        let router = Self::build_router(gate, forwarder);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(gate: GateState, forwarder: Forwarder) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(forwarder)
            .layer(middleware::from_fn_with_state(gate, gate_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires and open connections drain.
    pub async fn run(
        self,
        listener: Listener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.target,
            "HTTP server starting"
        );

        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        listener.serve(self.router, shutdown, grace).await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{DecisionCache, MemoryStore};
    use crate::lifecycle::shutdown::exit_channel;

    fn gatekeeper() -> Arc<Gatekeeper> {
        Arc::new(Gatekeeper::from_config(
            Arc::new(MemoryStore::new(Vec::<String>::new())),
            Arc::new(DecisionCache::new()),
            &GateConfig::default(),
        ))
    }

    #[test]
    fn accepts_https_upstream() {
        let mut config = GateConfig::default();
        config.upstream.target = "https://example.com".to_string();
        let (exits, _rx) = exit_channel();
        assert!(GateServer::new(config, gatekeeper(), exits).is_ok());
    }

    #[test]
    fn rejects_unsupported_upstream_scheme() {
        let mut config = GateConfig::default();
        config.upstream.target = "ftp://example.com".to_string();
        let (exits, _rx) = exit_channel();
        let err = GateServer::new(config, gatekeeper(), exits).err().unwrap();
        assert!(matches!(err, ServerError::Upstream(_)));
    }

    #[test]
    fn rejects_bad_header_name() {
        let mut config = GateConfig::default();
        config.access.client_ip_header = "bad header".to_string();
        let (exits, _rx) = exit_channel();
        let err = GateServer::new(config, gatekeeper(), exits).err().unwrap();
        assert!(matches!(err, ServerError::ClientIpHeader(_)));
    }

    #[test]
    fn builds_with_defaults() {
        let (exits, _rx) = exit_channel();
        let server = GateServer::new(GateConfig::default(), gatekeeper(), exits).unwrap();
        assert_eq!(server.config().upstream.target, "http://localhost:8080");
    }
}

//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect to the allow-list store (fail fast if unreachable)
//! - Bind the listener before anything can send traffic to it
//! - Start background tasks (cache sweeper, metrics exporter)
//! - Launch the startup script and serve until something ends the process
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - The first exit reason wins; lookup failures end the process without draining

use std::sync::Arc;

use thiserror::Error;

use crate::access::{DecisionCache, Gatekeeper, MembershipStore, RedisStore, StoreError};
use crate::config::GateConfig;
use crate::http::{GateServer, ServerError};
use crate::lifecycle::script::ScriptSupervisor;
use crate::lifecycle::shutdown::{exit_channel, ExitReason, Shutdown};
use crate::lifecycle::signals::shutdown_signal;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Allow-list store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("Invalid metrics address {0:?}")]
    MetricsAddress(String),
    #[error("Failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("Failed to start script: {0}")]
    Script(#[source] std::io::Error),
}

/// Connect to Redis and run until the process should exit.
pub async fn run(config: GateConfig) -> Result<ExitReason, StartupError> {
    let store = RedisStore::connect(
        &config.store.url,
        &config.store.set_key,
        config.store.connect_timeout(),
    )
    .await?;

    let listener = Listener::bind(&config.listener.bind_address).await?;
    serve(config, Arc::new(store), listener).await
}

/// Run the gate on an already bound listener with the given store.
pub async fn serve(
    config: GateConfig,
    store: Arc<dyn MembershipStore>,
    listener: Listener,
) -> Result<ExitReason, StartupError> {
    let shutdown = Shutdown::new();
    let (exits, mut exit_rx) = exit_channel();

    let cache = Arc::new(DecisionCache::new());
    let gatekeeper = Arc::new(Gatekeeper::from_config(store, cache.clone(), &config));
    let server = GateServer::new(config.clone(), gatekeeper, exits.clone())?;

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    tokio::spawn(cache.run_sweeper(config.cache.sweep_interval(), shutdown.subscribe()));

    if config.script.command.is_empty() {
        tracing::info!("No startup script configured");
    } else {
        ScriptSupervisor::new(&config.script)
            .spawn(exits.clone())
            .map_err(StartupError::Script)?;
    }

    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
    tracing::info!(
        listen = %local_addr,
        upstream = %config.upstream.target,
        redirect = %config.access.redirect_url,
        "Gate is running"
    );

    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let reason = tokio::select! {
        Some(reason) = exit_rx.recv() => reason,
        _ = shutdown_signal() => {
            shutdown.trigger();
            let _ = (&mut server_task).await;
            ExitReason::Interrupted
        }
        _ = &mut server_task => ExitReason::ServerStopped,
    };

    if reason != ExitReason::Interrupted {
        shutdown.trigger();
    }
    tracing::info!(reason = ?reason, exit_code = reason.exit_code(), "Gate exiting");
    Ok(reason)
}

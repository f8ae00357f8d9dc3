//! Access gate middleware.
//!
//! Runs in front of the proxy handler for every request:
//! resolve identity → decide → forward, or deny per the configured policy.
//! A failed allow-list lookup is fatal: the process is told to exit before
//! the request is denied.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::access::{ClientIdentity, DenialPolicy, Gatekeeper};
use crate::http::request::request_id;
use crate::lifecycle::shutdown::{ExitHandle, ExitReason};
use crate::net::connection::ConnectionControl;

/// Shared state for the gate.
#[derive(Clone)]
pub struct GateState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub identity: ClientIdentity,
    pub denial: DenialPolicy,
    pub exits: ExitHandle,
}

pub async fn gate_middleware(
    State(state): State<GateState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_default();
    let client = state.identity.resolve(request.headers(), &peer);
    let takeover = request.extensions().get::<ConnectionControl>().cloned();
    let request_id = request_id(request.headers()).to_string();

    match state.gatekeeper.check(&client).await {
        Ok(decision) if decision.allowed => {
            tracing::debug!(
                request_id = %request_id,
                client = %client,
                source = decision.source.as_str(),
                "Access allowed"
            );
            next.run(request).await
        }
        Ok(decision) => {
            tracing::debug!(
                request_id = %request_id,
                client = %client,
                source = decision.source.as_str(),
                "Access denied"
            );
            state.denial.respond(takeover).await
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                client = %client,
                error = %e,
                "Allow-list lookup failed"
            );
            state.exits.exit(ExitReason::StoreFailure(e.to_string()));
            state.denial.respond(takeover).await
        }
    }
}

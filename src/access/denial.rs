//! Denial responses.
//!
//! # Modes
//! - Redirect URL configured: `302 Found` to that URL
//! - Otherwise: seize the connection and close it without sending a single
//!   byte, so the service looks absent to scanners
//! - Connection takeover unavailable (HTTP/2, foreign transport): `403 Forbidden`

use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::net::connection::ConnectionControl;
use crate::observability::metrics;

/// How denied requests are answered.
#[derive(Debug, Clone, Default)]
pub struct DenialPolicy {
    redirect: Option<HeaderValue>,
}

impl DenialPolicy {
    /// Redirect denied requests to `location`.
    pub fn redirect(location: HeaderValue) -> Self {
        Self {
            redirect: Some(location),
        }
    }

    /// Drop denied connections silently.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Build from the configured redirect URL; empty means silent.
    pub fn from_redirect_url(url: &str) -> Result<Self, InvalidHeaderValue> {
        if url.is_empty() {
            return Ok(Self::silent());
        }
        Ok(Self::redirect(HeaderValue::from_str(url)?))
    }

    pub fn redirect_location(&self) -> Option<&HeaderValue> {
        self.redirect.as_ref()
    }

    /// Answer a denied request.
    ///
    /// When the connection is seized this future never completes; the
    /// connection task drops it together with the socket.
    pub async fn respond(&self, takeover: Option<ConnectionControl>) -> Response {
        if let Some(location) = &self.redirect {
            metrics::record_denial("redirect");
            return (StatusCode::FOUND, [(header::LOCATION, location.clone())]).into_response();
        }

        match takeover {
            Some(control) if control.seize() => {
                metrics::record_denial("drop");
                tracing::trace!(connection_id = %control.id(), "Connection seized");
                std::future::pending::<Response>().await
            }
            _ => {
                metrics::record_denial("forbidden");
                (StatusCode::FORBIDDEN, "Forbidden").into_response()
            }
        }
    }
}

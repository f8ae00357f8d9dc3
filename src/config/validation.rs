//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs (listener, upstream, store, redirect)
//! - Validate value ranges (timeouts > 0, TTL > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use crate::config::schema::GateConfig;

const STORE_SCHEMES: &[&str] = &["redis", "rediss", "unix", "redis+unix"];
const UPSTREAM_SCHEMES: &[&str] = &["http", "https"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g., "store.url").
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A socket address, or a hostname with a numeric port (resolved at bind time).
fn is_host_port(addr: &str) -> bool {
    if addr.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match addr.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_host_port(&config.listener.bind_address) {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a host:port address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.target) {
        Ok(url) if !UPSTREAM_SCHEMES.contains(&url.scheme()) => {
            errors.push(ValidationError::new(
                "upstream.target",
                format!("unsupported scheme '{}', expected http or https", url.scheme()),
            ))
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::new("upstream.target", "missing host"))
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(
            "upstream.target",
            format!("invalid URL '{}': {}", config.upstream.target, e),
        )),
    }

    if config.store.url.is_empty() {
        errors.push(ValidationError::new("store.url", "Redis URL is required"));
    } else {
        match Url::parse(&config.store.url) {
            Ok(url) if !STORE_SCHEMES.contains(&url.scheme()) => {
                errors.push(ValidationError::new(
                    "store.url",
                    format!("unsupported scheme '{}'", url.scheme()),
                ))
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(
                "store.url",
                format!("invalid Redis URL: {}", e),
            )),
        }
    }

    if config.store.set_key.is_empty() {
        errors.push(ValidationError::new("store.set_key", "set key is required"));
    }
    if config.store.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "store.connect_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.store.lookup_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "store.lookup_timeout_ms",
            "must be greater than zero",
        ));
    }

    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be greater than zero"));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "cache.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    let header = &config.access.client_ip_header;
    if !header.is_empty() && HeaderName::from_bytes(header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "access.client_ip_header",
            format!("'{}' is not a valid header name", header),
        ));
    }
    let redirect = &config.access.redirect_url;
    if !redirect.is_empty() && HeaderValue::from_str(redirect).is_err() {
        errors.push(ValidationError::new(
            "access.redirect_url",
            "contains characters not allowed in a Location header",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

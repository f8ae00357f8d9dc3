//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gatekeeper.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gatekeeper.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, shutdown drain).
    pub listener: ListenerConfig,

    /// Upstream server admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Remote allow-list store.
    pub store: StoreConfig,

    /// Local verdict cache.
    pub cache: CacheConfig,

    /// Client identification and denial behaviour.
    pub access: AccessConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Startup script supervised alongside the server.
    pub script: ScriptConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Seconds to wait for open connections after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            shutdown_grace_secs: 10,
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Absolute `http://` URL of the upstream server.
    pub target: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target: "http://localhost:8080".to_string(),
        }
    }
}

/// Remote allow-list store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis connection URL (e.g., "redis://:password@host:6379/0").
    pub url: String,

    /// Key of the Redis set holding allowed addresses.
    pub set_key: String,

    /// Startup connection + PING deadline in seconds.
    pub connect_timeout_secs: u64,

    /// Deadline for a single membership lookup in milliseconds.
    pub lookup_timeout_ms: u64,
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            set_key: "ip-allowed".to_string(),
            connect_timeout_secs: 5,
            lookup_timeout_ms: 2000,
        }
    }
}

/// Verdict cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached verdict in seconds.
    pub ttl_secs: u64,

    /// Period of the expired-entry sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10,
            sweep_interval_secs: 30,
        }
    }
}

/// Client identification and denial configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    /// Header carrying the client IP (e.g., "X-Real-IP"). Empty trusts only
    /// the transport peer address.
    pub client_ip_header: String,

    /// Redirect target for denied requests. Empty drops the connection
    /// without a response.
    pub redirect_url: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log every access decision (raises the crate log level to debug).
    pub detail: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            detail: false,
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Startup script configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Command run once at startup. Empty runs nothing.
    pub command: String,

    /// Shell program used to run the command. Defaults to `bash`
    /// (`powershell.exe` on Windows).
    pub shell: Option<String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            command: "echo 'No command was specified to run, please add the --script parameter.'"
                .to_string(),
            shell: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = GateConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8081");
        assert_eq!(config.store.set_key, "ip-allowed");
        assert_eq!(config.store.lookup_timeout(), Duration::from_secs(2));
        assert_eq!(config.cache.ttl(), Duration::from_secs(10));
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(30));
        assert!(config.access.redirect_url.is_empty());
        assert!(!config.observability.detail);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: GateConfig = toml::from_str(
            r#"
            [store]
            url = "redis://127.0.0.1:6379"

            [access]
            client_ip_header = "X-Real-IP"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.url, "redis://127.0.0.1:6379");
        assert_eq!(config.store.set_key, "ip-allowed");
        assert_eq!(config.access.client_ip_header, "X-Real-IP");
        assert_eq!(config.upstream.target, "http://localhost:8080");
    }
}

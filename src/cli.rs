//! Command-line interface.
//!
//! Flags override values read from `--config`, which override defaults.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::loader::{finalize, read_config};
use crate::config::{ConfigError, GateConfig};

#[derive(Debug, Parser)]
#[command(name = "gatekeeper")]
#[command(about = "Reverse proxy admitting clients found in a Redis allow-list", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Command run once at startup; the proxy exits with its exit code
    #[arg(long)]
    pub script: Option<String>,

    /// Listen address and port (":8081" listens on all interfaces)
    #[arg(long)]
    pub listen: Option<String>,

    /// Upstream server address
    #[arg(long)]
    pub target: Option<String>,

    /// Redis connection URL (e.g. redis://:password@host:port/db)
    #[arg(long)]
    pub redis: Option<String>,

    /// Redis set key containing allowed IPs
    #[arg(long = "set")]
    pub set_key: Option<String>,

    /// HTTP header to read the client IP from (e.g. X-Real-IP)
    #[arg(long)]
    pub ip_header: Option<String>,

    /// Redirect URL for denied requests (sends 302 if set)
    #[arg(long)]
    pub redirect: Option<String>,

    /// Log every access decision
    #[arg(long, value_enum)]
    pub detail: Option<Detail>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Detail {
    Enabled,
    Disabled,
}

impl Cli {
    /// Assemble the configuration without validating it.
    pub fn to_config(&self) -> Result<GateConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GateConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    /// Assemble and validate the configuration.
    pub fn load(&self) -> Result<GateConfig, ConfigError> {
        finalize(self.to_config()?)
    }

    fn apply(&self, config: &mut GateConfig) {
        if let Some(script) = &self.script {
            config.script.command = script.clone();
        }
        if let Some(listen) = &self.listen {
            config.listener.bind_address = normalize_listen(listen);
        }
        if let Some(target) = &self.target {
            config.upstream.target = target.clone();
        }
        if let Some(url) = &self.redis {
            config.store.url = url.clone();
        }
        if let Some(key) = &self.set_key {
            config.store.set_key = key.clone();
        }
        if let Some(header) = &self.ip_header {
            config.access.client_ip_header = header.clone();
        }
        if let Some(redirect) = &self.redirect {
            config.access.redirect_url = redirect.clone();
        }
        if let Some(detail) = self.detail {
            config.observability.detail = detail == Detail::Enabled;
        }
        if let Some(addr) = &self.metrics {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = normalize_listen(addr);
        }
    }
}

/// Expand a bare ":port" into an all-interfaces socket address.
pub fn normalize_listen(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

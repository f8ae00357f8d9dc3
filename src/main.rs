//! Gatekeeping reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌───────────────────────────────────────────────┐
//!                          │                  GATEKEEPER                   │
//!     Client Request       │  ┌─────────┐    ┌──────────┐    ┌─────────┐   │
//!     ─────────────────────┼─▶│   net   │───▶│   gate   │───▶│ forward │───┼──▶ Upstream
//!                          │  │listener │    │middleware│    │         │   │
//!                          │  └─────────┘    └────┬─────┘    └─────────┘   │
//!                          │                      │ deny                   │
//!                          │                      ▼                        │
//!                          │        302 redirect / silent drop / 403       │
//!                          │                                               │
//!                          │  ┌──────────┐  ┌──────────┐  ┌─────────────┐  │
//!                          │  │ decision │  │  Redis   │  │  lifecycle  │  │
//!                          │  │  cache   │  │ SISMEMBER│  │ script/exit │  │
//!                          │  └──────────┘  └──────────┘  └─────────────┘  │
//!                          └───────────────────────────────────────────────┘
//! ```

use clap::Parser;

use gatekeeper::cli::Cli;
use gatekeeper::config::ConfigError;
use gatekeeper::lifecycle::startup;
use gatekeeper::observability::logging;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gatekeeper starting");

    let config = match gatekeeper::config::loader::finalize(config) {
        Ok(config) => config,
        Err(ConfigError::Validation(errors)) => {
            for error in &errors {
                tracing::error!(field = error.field, "{}", error.message);
            }
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.target,
        set_key = %config.store.set_key,
        cache_ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    let code = match startup::run(config).await {
        Ok(reason) => reason.exit_code(),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            1
        }
    };

    std::process::exit(code);
}

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! access, http, lifecycle produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the HTTP layer into every request span
//! - Metric updates are cheap no-ops when no exporter is installed

pub mod logging;
pub mod metrics;

//! Gatekeeping reverse proxy.
//!
//! Admits each request only when the client address is on an internal
//! network or in a Redis allow-list set; everything else is redirected or
//! silently dropped.

pub mod access;
pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::GateConfig;
pub use http::GateServer;
pub use lifecycle::{ExitReason, Shutdown};

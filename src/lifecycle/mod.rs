//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Connect store → Bind listener → Start sweeper/metrics → Spawn script → Serve
//!
//! Exit (shutdown.rs):
//!     Script exits            → exit with its code
//!     Allow-list lookup fails → exit 1 immediately
//!     SIGTERM/SIGINT (signals.rs) → Stop accepting → Drain connections → exit 0
//! ```

pub mod script;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use script::ScriptSupervisor;
pub use shutdown::{exit_channel, ExitHandle, ExitReason, Shutdown};
pub use startup::StartupError;

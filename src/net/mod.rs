//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → connection.rs (hyper serving, ConnectInfo + takeover capability)
//!     → Hand off to HTTP layer (axum router)
//!
//! Connection States:
//!     Accepted → Active → (Draining | Seized) → Closed
//! ```
//!
//! # Design Decisions
//! - One task per connection, no connection cap
//! - Each connection tracked for graceful shutdown
//! - A seized connection is dropped without writing a response

pub mod connection;
pub mod listener;

pub use connection::{ConnectionControl, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};

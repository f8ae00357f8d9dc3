//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net layer)
//!     → request.rs (x-request-id assigned, trace span opened)
//!     → middleware/gate.rs (identity → decision → admit or deny)
//!     → forward.rs (rewrite, strip hop-by-hop, stream to upstream)
//!     → Send to client
//! ```

pub mod forward;
pub mod middleware;
pub mod request;
pub mod server;

pub use forward::{Forwarder, Upstream, UpstreamError};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{GateServer, ServerError};

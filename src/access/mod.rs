//! Access decision subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (headers, peer address)
//!     → identity.rs (trusted header or peer host)
//!     → classifier.rs (loopback/private → admit, no lookups)
//!     → cache.rs (fresh verdict → admit/deny)
//!     → store.rs (SISMEMBER on miss, bounded by lookup timeout)
//!     → cache.rs (write-back with TTL)
//!     → forward, or denial.rs (redirect / silent drop / 403)
//! ```
//!
//! # Design Decisions
//! - Fail closed: unparseable identities are checked against the allow-list
//! - The cache is an injected component, never a global
//! - A failed store lookup is fatal to the whole process (see http::middleware)

pub mod cache;
pub mod classifier;
pub mod denial;
pub mod gatekeeper;
pub mod identity;
pub mod store;

pub use cache::DecisionCache;
pub use classifier::is_internal;
pub use denial::DenialPolicy;
pub use gatekeeper::{Decision, DecisionSource, Gatekeeper};
pub use identity::ClientIdentity;
pub use store::{MembershipStore, MemoryStore, RedisStore, StoreError, StoreResult};

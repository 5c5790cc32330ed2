//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake, delegated to rustls)
//!     → Hand off to HTTP layer
//!
//! Upgrade request accepted for bridging:
//!     → connection.rs (reserve pairing slot, assign PairingId)
//!     → slot released when the pairing ends
//! ```
//!
//! # Design Decisions
//! - Pairing slots are bounded to prevent resource exhaustion
//! - Each pairing is tracked for graceful shutdown
//! - TLS is optional and handled transparently

pub mod connection;
pub mod tls;

pub use connection::{PairingGuard, PairingId, PairingTracker};

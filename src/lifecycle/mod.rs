//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Trigger → HTTP server stops accepting
//!             → live bridges close both legs (1001)
//!             → server waits for pairings to drain, then exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One broadcast channel reaches every long-running task
//! - Shutdown has a deadline: undrained pairings are abandoned after it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

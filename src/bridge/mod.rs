//! Bidirectional session bridge.
//!
//! # Data Flow
//! ```text
//! Upgrade request (routed by http::websocket)
//!     → outbound.rs (open backend socket; failure → HTTP error, no upgrade)
//!     → inbound.rs  (upgrade the client request)
//!     → relay.rs    (pair both sessions until either terminates)
//!
//! Each leg:
//!     session.rs (reader/writer actor, lifecycle state)
//!     wire.rs    (transport messages ↔ opaque frames)
//! ```
//!
//! # Design Decisions
//! - The backend must be open before the client is upgraded
//! - Sessions never reference each other; only the relay sees both
//! - Frame size is enforced on client traffic only
//! - All limits come from `BridgeConfig`, never process globals

pub mod error;
pub mod inbound;
pub mod outbound;
pub mod relay;
pub mod session;
pub mod wire;

pub use error::BridgeError;
pub use relay::{Bridge, BridgeOutcome};
pub use session::{SessionEvent, SessionHandle, SessionState, Side};
pub use wire::CloseReason;

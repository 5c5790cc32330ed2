//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, headers)
//!     → router.rs (route table lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: RouteTarget (Bridge, HttpProxy, Health, Static, NotFound)
//!
//! Bridge / HttpProxy targets:
//!     → shard.rs (split path into shard + remote path)
//!     → render backend URL from the route's host template
//! ```
//!
//! # Design Decisions
//! - Routes compiled from config, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Shard resolution is a pure function over the path string

pub mod matcher;
pub mod router;
pub mod shard;

pub use router::{RequestRouter, RouteTarget};
pub use shard::{RouteError, ShardRoute};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http, bridge, net
//!     → logging.rs (tracing subscriber, RUST_LOG or configured level)
//!     → metrics.rs (request, pairing and frame counters)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape on observability.metrics_address (when enabled)
//! ```
//!
//! # Design Decisions
//! - HTTP spans carry `request_id`; bridge events carry `pairing_id`
//! - Metric helpers are free functions; callers never see the recorder

pub mod logging;
pub mod metrics;

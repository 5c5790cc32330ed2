//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing span, timeout)
//!     → routing::RequestRouter (classify)
//!     → websocket.rs   (upgrade under the socket prefix → bridge)
//!     → passthrough.rs (single request under the HTTP prefix)
//!     → response.rs    (health, 404)
//!     → files.rs       (static prefix)
//!     → Send to client
//! ```

pub mod files;
pub mod passthrough;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{ProxyRequestId, X_REQUEST_ID};
pub use server::HttpServer;

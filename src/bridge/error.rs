//! Failures before a pairing starts relaying.
//!
//! Each variant maps to the HTTP response the client receives. After the
//! upgrade, failures only surface as close frames.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::bridge::inbound::UpgradeError;
use crate::bridge::outbound::ConnectError;
use crate::routing::RouteError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    /// Every pairing slot is taken.
    #[error("pairing limit of {0} reached")]
    AtCapacity(usize),
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::Route(_) | BridgeError::Upgrade(_) => StatusCode::BAD_REQUEST,
            BridgeError::Connect(_) => StatusCode::BAD_GATEWAY,
            BridgeError::AtCapacity(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> &'static str {
        match self {
            BridgeError::Route(_) => "Invalid path",
            BridgeError::Connect(_) => "Failed to connect to backend",
            BridgeError::Upgrade(_) => "WebSocket upgrade failed",
            BridgeError::AtCapacity(_) => "Too many connections",
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        (self.status(), self.body()).into_response()
    }
}

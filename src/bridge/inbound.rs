//! Inbound session: the client's request upgraded to a socket.
//!
//! Only called once the outbound session is open; a failed upgrade here
//! leaves the caller responsible for closing that outbound session.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use thiserror::Error;

use crate::bridge::session::{SessionHandle, Side};
use crate::config::BridgeConfig;

/// Transport ceiling axum applies when not configured.
const DEFAULT_TRANSPORT_MESSAGE_SIZE: usize = 64 << 20;

/// The client request cannot be upgraded.
#[derive(Debug, Error)]
#[error("client upgrade rejected: {0}")]
pub struct UpgradeError(#[from] WebSocketUpgradeRejection);

/// Validate the upgrade headers and prepare the handshake response.
///
/// Oversized frames must reach the relay to be refused with a close code,
/// so the transport ceiling is kept well above `max_frame_size`.
pub async fn accept_upgrade(parts: &mut Parts, settings: &BridgeConfig) -> Result<WebSocketUpgrade, UpgradeError> {
    let upgrade = WebSocketUpgrade::from_request_parts(parts, &()).await?;
    let ceiling = transport_ceiling(settings.max_frame_size);

    Ok(upgrade
        .protocols([settings.subprotocol.clone()])
        .max_message_size(ceiling)
        .max_frame_size(ceiling))
}

/// Wrap an upgraded client socket in a session.
pub fn attach(socket: WebSocket, capacity: usize) -> SessionHandle {
    SessionHandle::spawn(Side::Client, socket, capacity)
}

fn transport_ceiling(max_frame_size: usize) -> usize {
    max_frame_size.saturating_mul(2).max(DEFAULT_TRANSPORT_MESSAGE_SIZE)
}

//! Frame relay between a client session and a backend session.
//!
//! # Rules
//! - Client frames above `max_frame_size` close the client with 1009 and
//!   are never forwarded; the backend is closed with it
//! - Frames are forwarded in arrival order, only while the peer is open
//! - Backend frames are not size-checked
//! - A close or error on either side closes the other side and ends the
//!   pairing; later events from either transport are discarded
//! - Shutdown closes both sides with 1001
//! - Forwarding and closing never wait on a peer, so a stalled side cannot
//!   hold up the other direction

use std::time::Instant;

use axum::body::Bytes;
use tokio::sync::broadcast;

use crate::bridge::session::{SessionEvent, SessionHandle, Side};
use crate::bridge::wire::CloseReason;
use crate::lifecycle::shutdown;
use crate::net::PairingGuard;
use crate::observability::metrics;

/// How a pairing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// One side closed; the other was closed in response.
    Closed { by: Side, reason: Option<CloseReason> },
    /// One side's transport failed; the other was closed in response.
    Failed { side: Side, error: String },
    /// The client sent a frame above the limit.
    OversizeFrame { size: usize },
    /// The proxy is shutting down.
    Shutdown,
    /// A session was no longer open when relaying began.
    NotOpen { side: Side },
}

impl BridgeOutcome {
    /// Label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeOutcome::Closed { by: Side::Client, .. } => "client_closed",
            BridgeOutcome::Closed { by: Side::Backend, .. } => "backend_closed",
            BridgeOutcome::Failed { side: Side::Client, .. } => "client_failed",
            BridgeOutcome::Failed { side: Side::Backend, .. } => "backend_failed",
            BridgeOutcome::OversizeFrame { .. } => "oversize_frame",
            BridgeOutcome::Shutdown => "shutdown",
            BridgeOutcome::NotOpen { .. } => "not_open",
        }
    }
}

/// Owns one pairing from the moment both sessions are open.
pub struct Bridge {
    pairing: PairingGuard,
    max_frame_size: usize,
    shutdown: Option<broadcast::Receiver<()>>,
}

impl Bridge {
    pub fn new(pairing: PairingGuard, max_frame_size: usize) -> Self {
        Self {
            pairing,
            max_frame_size,
            shutdown: None,
        }
    }

    /// End the pairing with 1001 when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Relay until either side terminates. Both sessions are dropped on
    /// return, which releases their transports.
    pub async fn run(self, mut client: SessionHandle, mut backend: SessionHandle) -> BridgeOutcome {
        let started = Instant::now();
        let id = self.pairing.id();
        let mut shutdown = self.shutdown;

        let outcome = if !backend.is_open() {
            client.close(None);
            BridgeOutcome::NotOpen { side: Side::Backend }
        } else if !client.is_open() {
            backend.close(None);
            BridgeOutcome::NotOpen { side: Side::Client }
        } else {
            tracing::debug!(pairing_id = %id, "Relaying frames");
            loop {
                tokio::select! {
                    event = client.next_event() => {
                        let event = event.unwrap_or(SessionEvent::Closed(None));
                        if let SessionEvent::Frame(frame) = event {
                            if frame.len() > self.max_frame_size {
                                tracing::warn!(
                                    pairing_id = %id,
                                    size = frame.len(),
                                    limit = self.max_frame_size,
                                    "Client sent too large message"
                                );
                                metrics::record_oversize_frame();
                                client.close(Some(CloseReason::message_too_big()));
                                backend.close(None);
                                break BridgeOutcome::OversizeFrame { size: frame.len() };
                            }
                            forward(&backend, frame, "client_to_backend");
                        } else {
                            break terminate(event, Side::Client, &backend);
                        }
                    }
                    event = backend.next_event() => {
                        let event = event.unwrap_or(SessionEvent::Closed(None));
                        if let SessionEvent::Frame(frame) = event {
                            forward(&client, frame, "backend_to_client");
                        } else {
                            break terminate(event, Side::Backend, &client);
                        }
                    }
                    _ = shutdown_requested(&mut shutdown) => {
                        client.close(Some(CloseReason::going_away()));
                        backend.close(Some(CloseReason::going_away()));
                        break BridgeOutcome::Shutdown;
                    }
                }
            }
        };

        match &outcome {
            BridgeOutcome::Closed { by, reason } => tracing::info!(
                pairing_id = %id,
                by = %by,
                code = reason.as_ref().map(|r| r.code),
                reason = reason.as_ref().map(|r| r.reason.as_str()).unwrap_or(""),
                "Pairing closed"
            ),
            BridgeOutcome::Failed { side, error } => tracing::warn!(
                pairing_id = %id,
                side = %side,
                error = %error,
                "Pairing ended by transport error"
            ),
            other => tracing::info!(pairing_id = %id, outcome = other.as_str(), "Pairing ended"),
        }
        metrics::record_pairing_closed(outcome.as_str(), started);

        outcome
    }
}

fn forward(peer: &SessionHandle, frame: Bytes, direction: &'static str) {
    let len = frame.len();
    if peer.send(frame) {
        metrics::record_frame(direction, len);
    } else {
        tracing::trace!(to = %peer.side(), size = len, "Peer not open, frame dropped");
    }
}

/// Close `peer` in response to a terminal event from `side`.
fn terminate(event: SessionEvent, side: Side, peer: &SessionHandle) -> BridgeOutcome {
    peer.close(None);
    match event {
        SessionEvent::Failed(error) => BridgeOutcome::Failed { side, error },
        SessionEvent::Closed(reason) => BridgeOutcome::Closed { by: side, reason },
        SessionEvent::Frame(_) => BridgeOutcome::Closed { by: side, reason: None },
    }
}

async fn shutdown_requested(rx: &mut Option<broadcast::Receiver<()>>) {
    match rx {
        Some(rx) => shutdown::triggered(rx).await,
        None => std::future::pending().await,
    }
}

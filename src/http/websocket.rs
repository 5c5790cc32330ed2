//! WebSocket bridge entry point.
//!
//! # Responsibilities
//! - Resolve the backend shard from the request path
//! - Reserve a pairing slot
//! - Open the backend socket, then upgrade the client
//! - Hand both sessions to a `Bridge`
//!
//! # Data Flow
//! ```text
//! Client ──upgrade──▶ Proxy ──connect──▶ Backend
//!                       │ (only after the backend is open)
//!                       ▼
//! Client ◀──frames──▶ Bridge ◀──frames──▶ Backend
//! ```
//!
//! # Design Decisions
//! - One linear flow: every step before the upgrade can still answer with
//!   a plain HTTP error
//! - A watchdog closes the backend and frees the slot if the client never
//!   completes its upgrade
//! - The pairing inherits the request span, so its logs carry the request ID

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tokio::sync::{oneshot, Mutex};
use tracing::Instrument;

use crate::bridge::session::SessionCloser;
use crate::bridge::{inbound, outbound, Bridge, BridgeError};
use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::net::{PairingGuard, PairingTracker};
use crate::observability::metrics;
use crate::routing::ShardRoute;

/// Connect to the backend and upgrade the client, in that order.
///
/// Returns the 101 response; relaying starts once the upgrade completes.
pub async fn attempt_bridge(
    config: &ProxyConfig,
    pairings: &PairingTracker,
    shutdown: &Shutdown,
    request: Request<Body>,
) -> Result<Response, BridgeError> {
    let route = &config.routes.socket;
    let settings = &config.bridge;

    let shard = ShardRoute::resolve(request.uri().path(), &route.path_prefix)?;
    let target = shard.target_url(&route.host_template, request.uri().query())?;

    let pairing = pairings
        .try_track()
        .ok_or(BridgeError::AtCapacity(pairings.max_pairings()))?;
    let pairing_id = pairing.id();

    tracing::info!(pairing_id = %pairing_id, url = %target, "Connecting to backend");
    let backend = outbound::open(
        &target,
        &settings.subprotocol,
        Duration::from_secs(config.timeouts.connect_secs),
        settings.channel_capacity,
    )
    .await
    .map_err(|e| {
        metrics::record_connect_failure();
        tracing::warn!(pairing_id = %pairing_id, url = %target, error = %e, "Backend connect failed");
        e
    })?;

    let (mut parts, _body) = request.into_parts();
    let upgrade = match inbound::accept_upgrade(&mut parts, settings).await {
        Ok(upgrade) => upgrade,
        Err(e) => {
            tracing::warn!(pairing_id = %pairing_id, error = %e, "Client upgrade refused");
            backend.close(None);
            return Err(e.into());
        }
    };

    let pending = watch_upgrade(
        backend.closer(),
        Duration::from_secs(settings.upgrade_timeout_secs),
        pairing,
    );

    let capacity = settings.channel_capacity;
    let max_frame_size = settings.max_frame_size;
    let shutdown = shutdown.subscribe();
    let span = tracing::Span::current();

    let response = upgrade
        .on_failed_upgrade(move |e| {
            tracing::warn!(pairing_id = %pairing_id, error = %e, "Client upgrade did not complete");
        })
        .on_upgrade(move |socket| {
            async move {
                let client = inbound::attach(socket, capacity);
                let Some(pairing) = pending.adopt().await else {
                    // The watchdog already closed the backend and freed the slot.
                    client.close(None);
                    return;
                };
                Bridge::new(pairing, max_frame_size)
                    .with_shutdown(shutdown)
                    .run(client, backend)
                    .await;
            }
            .instrument(span)
        });

    Ok(response)
}

/// A pairing slot waiting for the client upgrade.
///
/// The upgrade and the watchdog race to take the slot; dropping this
/// unadopted ends the watchdog and frees the slot.
struct PendingUpgrade {
    pairing: Arc<Mutex<Option<PairingGuard>>>,
    _adopted: oneshot::Sender<()>,
}

impl PendingUpgrade {
    /// Take the slot. `None` once the watchdog has fired.
    async fn adopt(self) -> Option<PairingGuard> {
        self.pairing.lock().await.take()
    }
}

/// Close the backend and release the pairing unless the upgrade adopts it
/// within `timeout`.
fn watch_upgrade(backend: SessionCloser, timeout: Duration, pairing: PairingGuard) -> PendingUpgrade {
    let pairing_id = pairing.id();
    let slot = Arc::new(Mutex::new(Some(pairing)));
    let (adopted_tx, adopted_rx) = oneshot::channel::<()>();

    let watched = Arc::clone(&slot);
    tokio::spawn(async move {
        // Resolves early once the pending upgrade is adopted or dropped.
        if tokio::time::timeout(timeout, adopted_rx).await.is_ok() {
            return;
        }
        if let Some(pairing) = watched.lock().await.take() {
            tracing::warn!(
                pairing_id = %pairing_id,
                timeout = ?timeout,
                "Client upgrade timed out, closing backend"
            );
            backend.close(None);
            drop(pairing);
        }
    });

    PendingUpgrade {
        pairing: slot,
        _adopted: adopted_tx,
    }
}

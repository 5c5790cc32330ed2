//! Outbound session: the socket opened to the backend shard.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

use crate::bridge::session::{SessionHandle, Side};

/// Failure to open the backend socket.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The handshake request could not be built.
    #[error("invalid handshake request for {url}: {reason}")]
    Request { url: Url, reason: String },

    /// The backend refused or broke the handshake.
    #[error("handshake with {url} failed: {source}")]
    Handshake {
        url: Url,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// The handshake did not finish in time.
    #[error("handshake with {url} timed out after {timeout:?}")]
    Timeout { url: Url, timeout: Duration },
}

/// Open a WebSocket to `target`, requesting `subprotocol`.
///
/// Resolves only once the backend has accepted the handshake. The returned
/// session treats every payload as opaque bytes.
pub async fn open(
    target: &Url,
    subprotocol: &str,
    connect_timeout: Duration,
    capacity: usize,
) -> Result<SessionHandle, ConnectError> {
    let mut request = target
        .as_str()
        .into_client_request()
        .map_err(|e| ConnectError::Request {
            url: target.clone(),
            reason: e.to_string(),
        })?;
    let protocol = HeaderValue::from_str(subprotocol).map_err(|e| ConnectError::Request {
        url: target.clone(),
        reason: e.to_string(),
    })?;
    request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);

    let (stream, response) =
        match tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request)).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(source)) => {
                return Err(ConnectError::Handshake {
                    url: target.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ConnectError::Timeout {
                    url: target.clone(),
                    timeout: connect_timeout,
                })
            }
        };

    tracing::debug!(
        url = %target,
        status = %response.status(),
        protocol = ?response.headers().get(SEC_WEBSOCKET_PROTOCOL),
        "Backend session open"
    );

    Ok(SessionHandle::spawn(Side::Backend, stream, capacity))
}

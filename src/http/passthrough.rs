//! Stateless single-request proxy.
//!
//! # Responsibilities
//! - Resolve the shard from the path and render the HTTP backend URL
//! - Forward method, headers and body; return status, headers and body
//! - Turn transport failures into a plain 500
//!
//! # Design Decisions
//! - Request bodies are buffered up to a limit; responses are streamed
//! - `host` and hop-by-hop headers never cross the proxy
//! - No retries: a failed fetch is reported, not repeated

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use url::Url;

use crate::config::RouteDescriptor;
use crate::http::response::strip_hop_by_hop;
use crate::routing::{RouteError, ShardRoute};

#[derive(Debug, Error)]
pub enum PassthroughError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("request to {url} failed: {source}")]
    Upstream {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
}

impl IntoResponse for PassthroughError {
    fn into_response(self) -> Response {
        match self {
            PassthroughError::Route(_) => (StatusCode::BAD_REQUEST, "Invalid path").into_response(),
            PassthroughError::BodyTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large").into_response()
            }
            PassthroughError::Upstream { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Error in proxy").into_response()
            }
        }
    }
}

/// Forward `request` to the backend selected by its shard segment.
pub async fn forward(
    client: &reqwest::Client,
    route: &RouteDescriptor,
    max_body_size: usize,
    request: Request<Body>,
) -> Result<Response, PassthroughError> {
    let shard = ShardRoute::resolve(request.uri().path(), &route.path_prefix)?;
    let url = shard.target_url(&route.host_template, request.uri().query())?;

    let (parts, body) = request.into_parts();
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_body_size) {
        return Err(PassthroughError::BodyTooLarge { limit: max_body_size });
    }
    let body = axum::body::to_bytes(body, max_body_size).await.map_err(|e| {
        tracing::debug!(error = %e, "Request body not read");
        PassthroughError::BodyTooLarge { limit: max_body_size }
    })?;

    let mut headers = parts.headers;
    headers.remove(header::HOST);
    strip_hop_by_hop(&mut headers);

    tracing::debug!(url = %url, method = %parts.method, "Proxying request");
    let upstream = client
        .request(parts.method, url.clone())
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|source| PassthroughError::Upstream {
            url: url.clone(),
            source,
        })?;

    let status = upstream.status();
    tracing::debug!(url = %url, status = %status, "Backend responded");

    let mut response_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut response_headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

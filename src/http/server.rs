//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router and its middleware (request ID, tracing, timeout)
//! - Dispatch each request to the bridge, pass-through, health or static
//!   handler chosen by the request router
//! - Swap in reloaded configuration without restarting
//! - Stop accepting on shutdown and give live pairings time to drain
//!
//! # Design Decisions
//! - Route table and settings live together in one `Runtime` behind
//!   `ArcSwap`; a request sees one consistent snapshot
//! - The outbound HTTP client and the pairing limit are fixed at startup

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::request::{request_id, ProxyRequestId};
use crate::http::{files, passthrough, response, websocket};
use crate::lifecycle::shutdown;
use crate::lifecycle::Shutdown;
use crate::net::PairingTracker;
use crate::observability::metrics;
use crate::routing::{RequestRouter, RouteTarget};

/// Settings and the route table compiled from them.
#[derive(Debug)]
pub struct Runtime {
    pub config: ProxyConfig,
    pub router: RequestRouter,
}

impl Runtime {
    pub fn new(config: ProxyConfig) -> Self {
        let router = RequestRouter::from_config(&config.routes);
        Self { config, router }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ArcSwap<Runtime>>,
    pub client: reqwest::Client,
    pub pairings: PairingTracker,
    pub shutdown: Shutdown,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
    drain_timeout: Duration,
}

impl HttpServer {
    /// Create a server whose bridges end when `shutdown` is triggered.
    pub fn new(config: ProxyConfig, shutdown: Shutdown) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .build()?;

        let drain_timeout = Duration::from_secs(config.timeouts.drain_secs);
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let state = AppState {
            pairings: PairingTracker::new(config.bridge.max_pairings),
            runtime: Arc::new(ArcSwap::from_pointee(Runtime::new(config))),
            client,
            shutdown,
        };

        let router = Self::build_router(request_timeout, state.clone());
        Ok(Self {
            router,
            state,
            drain_timeout,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(request_timeout: Duration, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request)
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(ProxyRequestId))
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The live pairing tracker.
    pub fn pairings(&self) -> &PairingTracker {
        &self.state.pairings
    }

    /// Run on a plain TCP listener until shutdown is triggered.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reload = spawn_reload(Arc::clone(&self.state.runtime), config_updates);
        let mut stop = self.state.shutdown.subscribe();

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move { shutdown::triggered(&mut stop).await })
            .await?;

        reload.abort();
        drain(&self.state.pairings, self.drain_timeout).await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run with TLS termination until shutdown is triggered.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let reload = spawn_reload(Arc::clone(&self.state.runtime), config_updates);
        let handle = axum_server::Handle::new();
        let mut stop = self.state.shutdown.subscribe();
        let stopper = handle.clone();
        tokio::spawn(async move {
            shutdown::triggered(&mut stop).await;
            stopper.graceful_shutdown(None);
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        reload.abort();
        drain(&self.state.pairings, self.drain_timeout).await;
        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Main dispatch handler.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let runtime = state.runtime.load_full();
    let target = runtime.router.route(&request);

    tracing::debug!(target_kind = target.as_str(), "Dispatching request");

    let response = match target {
        RouteTarget::Bridge => {
            match websocket::attempt_bridge(&runtime.config, &state.pairings, &state.shutdown, request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::info!(error = %e, status = %e.status(), "Bridge refused");
                    e.into_response()
                }
            }
        }
        RouteTarget::HttpProxy => {
            let config = &runtime.config;
            match passthrough::forward(&state.client, &config.routes.http, config.passthrough.max_body_size, request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "Pass-through request failed");
                    e.into_response()
                }
            }
        }
        RouteTarget::Health => response::health(),
        RouteTarget::Static => match &runtime.config.routes.static_files {
            Some(static_files) => files::serve(static_files, request).await,
            None => response::not_found(),
        },
        RouteTarget::NotFound => response::not_found(),
    };

    metrics::record_request(target.as_str(), response.status().as_u16(), start);
    response
}

fn spawn_reload(
    runtime: Arc<ArcSwap<Runtime>>,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            runtime.store(Arc::new(Runtime::new(config)));
            tracing::info!("Configuration reloaded");
        }
    })
}

async fn drain(pairings: &PairingTracker, timeout: Duration) {
    let live = pairings.active_count();
    if live == 0 {
        return;
    }
    tracing::info!(pairings = live, timeout = ?timeout, "Waiting for pairings to drain");
    if !pairings.wait_for_drain(timeout).await {
        tracing::warn!(pairings = pairings.active_count(), "Drain timed out, abandoning pairings");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        HttpServer::new(ProxyConfig::default(), Shutdown::new()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok_and_carries_request_id() {
        let response = server()
            .router()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header("x-request-id", "trace-me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "trace-me");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = server()
            .router()
            .oneshot(Request::builder().uri("/elsewhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Not found");
    }

    #[tokio::test]
    async fn short_socket_path_is_bad_request() {
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .uri("/tg/wss/2")
                    .header("upgrade", "websocket")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Invalid path");
    }

    #[tokio::test]
    async fn reload_swaps_routes() {
        let server = server();
        let (tx, rx) = mpsc::unbounded_channel();
        let reload = spawn_reload(Arc::clone(&server.state.runtime), rx);

        let mut config = ProxyConfig::default();
        config.routes.health_path = "/ready".into();
        tx.send(config).unwrap();
        drop(tx);
        reload.await.unwrap();

        let response = server
            .router()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

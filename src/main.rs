//! Shard proxy
//!
//! Bridges client WebSocket sessions to data-center-sharded backends and
//! passes single HTTP requests through to the same shards.
//!
//! ```text
//!                  ┌──────────────────────── shard-proxy ────────────────────────┐
//!  Client ────────▶│ http::server ──▶ routing ──┬──▶ http::websocket ──▶ bridge ─┼──▶ wss://kws{shard}…
//!                  │                            ├──▶ http::passthrough ─────────┼──▶ https://{shard}…
//!                  │                            ├──▶ health / static files      │
//!                  │                            └──▶ 404                        │
//!                  │  config (reload) · lifecycle (signals, drain) · metrics    │
//!                  └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use shard_proxy::config::validation::validate_config;
use shard_proxy::config::watcher::ConfigWatcher;
use shard_proxy::config::{load_config, ConfigError, ProxyConfig};
use shard_proxy::lifecycle::{signals, Shutdown};
use shard_proxy::net::tls::load_tls_config;
use shard_proxy::observability::{logging, metrics};
use shard_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "shard-proxy")]
#[command(about = "WebSocket and HTTP proxy for sharded backends", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes
    #[arg(short, long, requires = "config")]
    watch: bool,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "shard-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        socket_prefix = %config.routes.socket.path_prefix,
        http_prefix = %config.routes.http.path_prefix,
        max_frame_size = config.bridge.max_frame_size,
        max_pairings = config.bridge.max_pairings,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    // Shutdown on SIGINT/SIGTERM
    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::termination().await;
        trigger.trigger();
    });

    // Hot reload; the watcher handle must outlive the server
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let addr: SocketAddr = config.listener.bind_address.parse()?;
    let tls = config.listener.tls.clone();
    let server = HttpServer::new(config, shutdown)?;

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(addr, rustls, config_updates).await?;
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, config_updates).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

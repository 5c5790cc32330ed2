//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Frames larger than this are refused on the client to backend leg.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 5 * 1024 * 1024;

/// Subprotocol negotiated on both legs of a bridged session.
pub const DEFAULT_SUBPROTOCOL: &str = "binary";

/// Placeholder substituted with the shard identifier in host templates.
pub const SHARD_PLACEHOLDER: &str = "{shard}";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Path prefixes and backend host templates.
    pub routes: RoutesConfig,

    /// Bridged session settings.
    pub bridge: BridgeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Stateless HTTP pass-through settings.
    pub passthrough: PassthroughConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8765").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8765".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// A path prefix paired with the backend host it resolves to.
///
/// `{shard}` in `host_template` is replaced with the shard identifier taken
/// from the request path; the remote path is appended after a `/`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Request path prefix that selects this route.
    pub path_prefix: String,

    /// Backend URL template, e.g. `wss://kws{shard}.web.telegram.org`.
    pub host_template: String,
}

/// Static file serving.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StaticFilesConfig {
    /// Request path prefix served from disk.
    pub path_prefix: String,

    /// Local directory the prefix maps onto.
    pub root: String,
}

/// Request dispatch table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Upgrade requests under this prefix are bridged to a backend socket.
    pub socket: RouteDescriptor,

    /// Requests under this prefix are forwarded as single HTTP calls.
    pub http: RouteDescriptor,

    /// Exact path answered with `200 ok`.
    pub health_path: String,

    /// Optional static file tree. `None` disables static serving.
    pub static_files: Option<StaticFilesConfig>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            socket: RouteDescriptor {
                path_prefix: "/tg/wss".to_string(),
                host_template: "wss://kws{shard}.web.telegram.org".to_string(),
            },
            http: RouteDescriptor {
                path_prefix: "/tg/http".to_string(),
                host_template: "https://{shard}.web.telegram.org".to_string(),
            },
            health_path: "/healthz".to_string(),
            static_files: Some(StaticFilesConfig {
                path_prefix: "/tg".to_string(),
                root: "tg".to_string(),
            }),
        }
    }
}

/// Bridged session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Largest client frame forwarded to the backend, in bytes.
    pub max_frame_size: usize,

    /// Subprotocol token requested from the backend and offered to the client.
    pub subprotocol: String,

    /// Capacity of the per-session event queue.
    pub channel_capacity: usize,

    /// Seconds an open backend session waits for the client upgrade.
    pub upgrade_timeout_secs: u64,

    /// Maximum concurrent bridged pairings.
    pub max_pairings: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            subprotocol: DEFAULT_SUBPROTOCOL.to_string(),
            channel_capacity: 64,
            upgrade_timeout_secs: 10,
            max_pairings: 10_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout for non-upgraded traffic in seconds.
    pub request_secs: u64,

    /// Time allowed for live pairings to close during shutdown, in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 30,
            drain_secs: 5,
        }
    }
}

/// Stateless HTTP pass-through configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PassthroughConfig {
    /// Maximum request body size buffered before forwarding.
    pub max_body_size: usize,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            max_body_size: 8 * 1024 * 1024, // 8MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8765");
        assert_eq!(config.routes.socket.path_prefix, "/tg/wss");
        assert_eq!(config.routes.http.host_template, "https://{shard}.web.telegram.org");
        assert_eq!(config.routes.health_path, "/healthz");
        assert_eq!(config.bridge.max_frame_size, 5 * 1024 * 1024);
        assert_eq!(config.bridge.subprotocol, "binary");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [bridge]
            max_frame_size = 1024

            [routes.socket]
            path_prefix = "/ws"
            host_template = "ws://127.0.0.1:9000/{shard}"
            "#,
        )
        .unwrap();

        assert_eq!(config.bridge.max_frame_size, 1024);
        assert_eq!(config.bridge.subprotocol, "binary");
        assert_eq!(config.routes.socket.path_prefix, "/ws");
        assert_eq!(config.routes.http.path_prefix, "/tg/http");
        assert!(config.routes.static_files.is_some());
    }
}

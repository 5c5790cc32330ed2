//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that route templates produce usable backend URLs
//! - Validate value ranges (timeouts > 0, limits > 0, address parses)
//! - Detect conflicting route prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, RouteDescriptor, SHARD_PLACEHOLDER};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    check_route(&mut errors, "routes.socket", &config.routes.socket, &["ws", "wss"]);
    check_route(&mut errors, "routes.http", &config.routes.http, &["http", "https"]);
    if config.routes.socket.path_prefix == config.routes.http.path_prefix {
        errors.push(ValidationError::new(
            "routes.http.path_prefix",
            "must differ from routes.socket.path_prefix",
        ));
    }
    check_path(&mut errors, "routes.health_path", &config.routes.health_path);
    if let Some(files) = &config.routes.static_files {
        check_path(&mut errors, "routes.static_files.path_prefix", &files.path_prefix);
        if files.root.is_empty() {
            errors.push(ValidationError::new("routes.static_files.root", "must not be empty"));
        }
    }

    let bridge = &config.bridge;
    if bridge.max_frame_size == 0 {
        errors.push(ValidationError::new("bridge.max_frame_size", "must be greater than 0"));
    }
    if bridge.subprotocol.is_empty()
        || HeaderValue::from_str(&bridge.subprotocol).is_err()
        || bridge
            .subprotocol
            .chars()
            .any(|c| c == ',' || c.is_ascii_whitespace())
    {
        errors.push(ValidationError::new(
            "bridge.subprotocol",
            "must be a single non-empty header token",
        ));
    }
    if bridge.channel_capacity == 0 {
        errors.push(ValidationError::new("bridge.channel_capacity", "must be greater than 0"));
    }
    if bridge.upgrade_timeout_secs == 0 {
        errors.push(ValidationError::new("bridge.upgrade_timeout_secs", "must be greater than 0"));
    }
    if bridge.max_pairings == 0 {
        errors.push(ValidationError::new("bridge.max_pairings", "must be greater than 0"));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.request_secs", timeouts.request_secs),
        ("timeouts.drain_secs", timeouts.drain_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.passthrough.max_body_size == 0 {
        errors.push(ValidationError::new("passthrough.max_body_size", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_path(errors: &mut Vec<ValidationError>, field: &str, path: &str) {
    if !path.starts_with('/') || path.len() < 2 {
        errors.push(ValidationError::new(
            field,
            format!("'{}' must start with '/' and name at least one segment", path),
        ));
    }
}

fn check_route(errors: &mut Vec<ValidationError>, field: &str, route: &RouteDescriptor, schemes: &[&str]) {
    check_path(errors, &format!("{}.path_prefix", field), &route.path_prefix);

    let template_field = format!("{}.host_template", field);
    if !route.host_template.contains(SHARD_PLACEHOLDER) {
        errors.push(ValidationError::new(
            template_field,
            format!("must contain the {} placeholder", SHARD_PLACEHOLDER),
        ));
        return;
    }

    match Url::parse(&route.host_template.replace(SHARD_PLACEHOLDER, "1")) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::new(
            template_field,
            format!("scheme '{}' is not one of {:?}", url.scheme(), schemes),
        )),
        Err(e) => errors.push(ValidationError::new(template_field, format!("not a URL: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.bridge.max_frame_size = 0;
        config.bridge.subprotocol = "binary, text".into();
        config.timeouts.connect_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "bridge.max_frame_size",
                "bridge.subprotocol",
                "timeouts.connect_secs",
            ]
        );
    }

    #[test]
    fn template_needs_placeholder_and_scheme() {
        let mut config = ProxyConfig::default();
        config.routes.socket.host_template = "wss://kws.web.telegram.org".into();
        config.routes.http.host_template = "ws://{shard}.web.telegram.org".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "routes.socket.host_template");
        assert!(errors[1].message.contains("scheme 'ws'"));
    }

    #[test]
    fn prefixes_must_differ_and_be_paths() {
        let mut config = ProxyConfig::default();
        config.routes.http.path_prefix = config.routes.socket.path_prefix.clone();
        config.routes.health_path = "healthz".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "routes.http.path_prefix"));
        assert!(errors.iter().any(|e| e.field == "routes.health_path"));
    }

    #[test]
    fn tls_paths_required() {
        let mut config = ProxyConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::new("listener.tls.cert_path", "must not be empty")]);
    }
}

//! Request dispatch.
//!
//! # Responsibilities
//! - Compile the route table from `RoutesConfig`
//! - Classify each request into exactly one target
//! - Return an explicit `NotFound` rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - Fixed priority: bridge, HTTP pass-through, health, static
//! - First match wins

use axum::body::Body;
use axum::http::Request;

use crate::config::RoutesConfig;
use crate::routing::matcher::{AndMatcher, ExactPathMatcher, Matcher, PathPrefixMatcher, UpgradeMatcher};

/// Where a request is handed off to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Upgrade request under the socket prefix.
    Bridge,
    /// Anything under the HTTP prefix.
    HttpProxy,
    /// The health path.
    Health,
    /// Anything under the static prefix.
    Static,
    /// No rule matched.
    NotFound,
}

impl RouteTarget {
    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTarget::Bridge => "bridge",
            RouteTarget::HttpProxy => "http_proxy",
            RouteTarget::Health => "health",
            RouteTarget::Static => "static",
            RouteTarget::NotFound => "not_found",
        }
    }
}

/// Compiled route table.
#[derive(Debug)]
pub struct RequestRouter {
    rules: Vec<(Box<dyn Matcher>, RouteTarget)>,
}

impl RequestRouter {
    /// Compile the table in priority order.
    pub fn from_config(routes: &RoutesConfig) -> Self {
        let mut rules: Vec<(Box<dyn Matcher>, RouteTarget)> = vec![
            (
                Box::new(AndMatcher::new(vec![
                    Box::new(PathPrefixMatcher::new(routes.socket.path_prefix.clone())),
                    Box::new(UpgradeMatcher),
                ])),
                RouteTarget::Bridge,
            ),
            (
                Box::new(PathPrefixMatcher::new(routes.http.path_prefix.clone())),
                RouteTarget::HttpProxy,
            ),
            (
                Box::new(ExactPathMatcher::new(routes.health_path.clone())),
                RouteTarget::Health,
            ),
        ];
        if let Some(files) = &routes.static_files {
            rules.push((
                Box::new(PathPrefixMatcher::new(files.path_prefix.clone())),
                RouteTarget::Static,
            ));
        }

        Self { rules }
    }

    /// Classify a request.
    pub fn route(&self, req: &Request<Body>) -> RouteTarget {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(req))
            .map(|(_, target)| *target)
            .unwrap_or(RouteTarget::NotFound)
    }
}

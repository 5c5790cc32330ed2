//! Request matching logic.
//!
//! # Responsibilities
//! - Match path prefix on whole segments (case-sensitive)
//! - Match exact path
//! - Detect WebSocket upgrade intent from the `Upgrade` header
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Upgrade header value is compared case-insensitively
//! - No regex to guarantee O(n) matching

use axum::body::Body;
use axum::http::{header, Request};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Strip `prefix` from `path` when it covers whole leading segments.
///
/// `/tg/wss` strips from `/tg/wss` and `/tg/wss/2` but not from `/tg/wss2`.
pub fn strip_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix.trim_end_matches('/'))?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        strip_segment_prefix(req.uri().path(), &self.prefix).is_some()
    }
}

/// Matches one path exactly.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.uri().path() == self.path
    }
}

/// Matches requests asking to upgrade to a WebSocket.
#[derive(Debug, Clone, Default)]
pub struct UpgradeMatcher;

impl Matcher for UpgradeMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get(header::UPGRADE)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.trim().eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

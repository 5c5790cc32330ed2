//! Shard resolution.
//!
//! Turns `<prefix>/{shard}/{remote...}` into a shard identifier and a remote
//! path, then renders a backend URL from a host template.
//!
//! ```text
//! /tg/wss/2/apiws  +  wss://kws{shard}.web.telegram.org
//!     → shard "2", remote "apiws"
//!     → wss://kws2.web.telegram.org/apiws
//! ```

use thiserror::Error;
use url::Url;

use crate::config::schema::SHARD_PLACEHOLDER;
use crate::routing::matcher::strip_segment_prefix;

/// Why a request path could not be mapped to a backend.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The path is not under the route prefix, or fewer than two segments
    /// follow it.
    #[error("path '{0}' needs a shard and a remote path after the prefix")]
    InvalidPath(String),

    /// The shard segment contains characters that cannot form a host label.
    #[error("shard '{0}' may only contain ASCII letters, digits, '-' and '_'")]
    InvalidShard(String),

    /// The rendered template is not a valid URL.
    #[error("rendered target '{target}' is not a URL: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },
}

/// A request path split into its shard and remote parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRoute {
    /// Data-center token, e.g. `2` or `4-1`.
    pub shard_id: String,
    /// Segments after the shard, joined with `/`.
    pub remote_path: String,
}

impl ShardRoute {
    /// Split `path` after stripping `prefix`.
    ///
    /// The prefix must cover whole segments. Empty segments are ignored, so
    /// `//` and trailing slashes do not count toward the two required
    /// segments.
    pub fn resolve(path: &str, prefix: &str) -> Result<Self, RouteError> {
        let remainder = strip_segment_prefix(path, prefix)
            .ok_or_else(|| RouteError::InvalidPath(path.to_string()))?;
        let mut segments = remainder.split('/').filter(|s| !s.is_empty());

        let shard_id = segments
            .next()
            .ok_or_else(|| RouteError::InvalidPath(path.to_string()))?;
        let remote: Vec<&str> = segments.collect();
        if remote.is_empty() {
            return Err(RouteError::InvalidPath(path.to_string()));
        }

        if !shard_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(RouteError::InvalidShard(shard_id.to_string()));
        }

        Ok(Self {
            shard_id: shard_id.to_string(),
            remote_path: remote.join("/"),
        })
    }

    /// Render the backend URL for this route.
    pub fn target_url(&self, host_template: &str, query: Option<&str>) -> Result<Url, RouteError> {
        let base = host_template.replace(SHARD_PLACEHOLDER, &self.shard_id);
        let target = format!("{}/{}", base.trim_end_matches('/'), self.remote_path);

        let mut url = Url::parse(&target).map_err(|source| RouteError::InvalidTarget {
            target: target.clone(),
            source,
        })?;
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.set_query(Some(query));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_shard_and_remote_path() {
        let route = ShardRoute::resolve("/tg/wss/2/apiws", "/tg/wss").unwrap();
        assert_eq!(route.shard_id, "2");
        assert_eq!(route.remote_path, "apiws");

        let url = route
            .target_url("wss://kws{shard}.web.telegram.org", None)
            .unwrap();
        assert_eq!(url.as_str(), "wss://kws2.web.telegram.org/apiws");
    }

    #[test]
    fn socket_and_http_templates_differ() {
        let route = ShardRoute::resolve("/tg/http/4-1/apiw1", "/tg/http").unwrap();
        assert_eq!(
            route.target_url("https://{shard}.web.telegram.org", None).unwrap().as_str(),
            "https://4-1.web.telegram.org/apiw1"
        );
        assert_eq!(
            route.target_url("wss://kws{shard}.web.telegram.org", None).unwrap().as_str(),
            "wss://kws4-1.web.telegram.org/apiw1"
        );
    }

    #[test]
    fn keeps_nested_remote_path_and_query() {
        let route = ShardRoute::resolve("/tg/http/1/a/b/c", "/tg/http").unwrap();
        assert_eq!(route.remote_path, "a/b/c");

        let url = route
            .target_url("https://{shard}.example.org/", Some("x=1"))
            .unwrap();
        assert_eq!(url.as_str(), "https://1.example.org/a/b/c?x=1");
    }

    #[test]
    fn rejects_short_paths() {
        for path in ["/tg/wss", "/tg/wss/", "/tg/wss/2", "/tg/wss/2/", "/tg/wss//2//"] {
            assert!(
                matches!(ShardRoute::resolve(path, "/tg/wss"), Err(RouteError::InvalidPath(_))),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn prefix_must_end_on_a_segment() {
        for (path, prefix) in [("/tg/wss2/apiws", "/tg/wss"), ("/tg/httpX/y/z", "/tg/http")] {
            assert!(
                matches!(ShardRoute::resolve(path, prefix), Err(RouteError::InvalidPath(_))),
                "{} should not resolve under {}",
                path,
                prefix
            );
        }

        let route = ShardRoute::resolve("/tg/wss/2/apiws", "/tg/wss/").unwrap();
        assert_eq!(route.shard_id, "2");
    }

    #[test]
    fn rejects_host_injection() {
        let err = ShardRoute::resolve("/tg/wss/evil.com:443@x/apiws", "/tg/wss").unwrap_err();
        assert!(matches!(err, RouteError::InvalidShard(_)));
    }
}

//! Static file serving under a reserved prefix.

use axum::body::Body;
use axum::http::{Request, Uri};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::StaticFilesConfig;
use crate::http::response::not_found;
use crate::routing::matcher::strip_segment_prefix;

/// Serve `request` from `files.root`, with the prefix removed from its path.
///
/// `/tg/app.js` maps to `<root>/app.js`; `/tg` and `/tg/` map to the
/// directory index. A path that only shares leading characters with the
/// prefix (`/tgx`) is not served.
pub async fn serve(files: &StaticFilesConfig, request: Request<Body>) -> Response {
    let Some(uri) = strip_prefix(request.uri(), &files.path_prefix) else {
        return not_found();
    };

    let (mut parts, body) = request.into_parts();
    parts.uri = uri;
    let request = Request::from_parts(parts, body);

    match ServeDir::new(&files.root).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

fn strip_prefix(uri: &Uri, prefix: &str) -> Option<Uri> {
    let path = match strip_segment_prefix(uri.path(), prefix)? {
        "" => "/",
        rest => rest,
    };
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    path_and_query.parse().ok()
}

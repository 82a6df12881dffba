//! Path matching and rewriting

use crate::route::Route;
use http::Uri;

/// Result of a successful route match
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    /// The matched route
    pub route: &'a Route,

    /// Whether the catch-all route was used as fallback
    pub fallback: bool,
}

impl Match<'_> {
    /// Upstream path-and-query for the given request URI
    pub fn upstream_path_and_query(&self, uri: &Uri) -> String {
        rewrite_uri(self.route, uri)
    }
}

/// Check whether `prefix` matches `path` on a segment boundary
///
/// `/api` matches `/api`, `/api/` and `/api/users` but not `/apiv2`.
/// The root prefix matches every path that starts with '/'.
pub fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }

    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Replace `prefix` in `path` with `rewrite_base`
///
/// Exactly one '/' joins the base and the remainder; an empty remainder
/// yields the base itself. Pure and total: a path that does not carry the
/// prefix is treated as the remainder.
pub fn rewrite(prefix: &str, rewrite_base: &str, path: &str) -> String {
    let remainder = if prefix == "/" {
        path
    } else {
        path.strip_prefix(prefix).unwrap_or(path)
    };
    let remainder = remainder.strip_prefix('/').unwrap_or(remainder);
    let base = rewrite_base.trim_end_matches('/');

    match (base.is_empty(), remainder.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => base.to_string(),
        _ => format!("{base}/{remainder}"),
    }
}

/// Rewrite a request URI for `route`, keeping the query string verbatim
pub fn rewrite_uri(route: &Route, uri: &Uri) -> String {
    let path = rewrite(&route.prefix, &route.rewrite_base, uri.path());

    match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    }
}

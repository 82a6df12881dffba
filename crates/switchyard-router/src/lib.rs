//! # Switchyard Router
//!
//! Longest-prefix route table:
//! - Segment-aligned prefix matching (`/api` never matches `/apiv2`)
//! - Catch-all `/` fallback
//! - Deterministic tie-breaking in registration order
//! - Pure prefix rewriting onto a per-route base path
//!
//! The table is immutable once built and can be shared across tasks
//! without locking.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod matcher;
pub mod route;

pub use matcher::{prefix_matches, rewrite, rewrite_uri, Match};
pub use route::{Route, RouteBuilder};

use std::collections::HashSet;
use std::time::Duration;
use switchyard_config::{validate_routes, RouteConfig};
use switchyard_core::{Error, Result, UpstreamTarget};

/// Immutable route table
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    /// Routes in registration order
    routes: Vec<Route>,

    /// Indices of non-root routes, longest prefix first
    by_length: Vec<usize>,

    /// Index of the catch-all route
    catch_all: Option<usize>,
}

impl RouteTable {
    /// Build a table from routes
    ///
    /// Fails on duplicate prefixes, including a second catch-all.
    pub fn new(routes: Vec<Route>) -> Result<Self> {
        let mut seen = HashSet::new();
        for route in &routes {
            if !seen.insert(route.prefix.as_str()) {
                return Err(Error::Config(if route.is_catch_all() {
                    "Duplicate catch-all route '/'".to_string()
                } else {
                    format!("Duplicate route prefix: {}", route.prefix)
                }));
            }
        }

        let catch_all = routes.iter().position(Route::is_catch_all);

        let mut by_length: Vec<usize> = (0..routes.len())
            .filter(|&i| !routes[i].is_catch_all())
            .collect();
        // Stable, so equal lengths keep registration order
        by_length.sort_by(|&a, &b| routes[b].prefix.len().cmp(&routes[a].prefix.len()));

        tracing::debug!(
            routes = routes.len(),
            catch_all = catch_all.is_some(),
            "Route table built"
        );

        Ok(Self {
            routes,
            by_length,
            catch_all,
        })
    }

    /// Build a table from route configuration
    ///
    /// Routes without an explicit timeout get `default_timeout`.
    pub fn load(configs: &[RouteConfig], default_timeout: Duration) -> Result<Self> {
        validate_routes(configs)?;

        let routes = configs
            .iter()
            .map(|config| {
                let mut route = Route::try_from(config)?;
                route.timeout.get_or_insert(default_timeout);
                Ok(route)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(routes)
    }

    /// Find the route for a request path
    ///
    /// The longest segment-aligned prefix wins. Paths no prefix covers,
    /// including ones that do not start with '/', go to the catch-all.
    pub fn match_path(&self, path: &str) -> Result<Match<'_>> {
        let matched = self
            .by_length
            .iter()
            .map(|&i| &self.routes[i])
            .find(|route| prefix_matches(&route.prefix, path));

        if let Some(route) = matched {
            return Ok(Match {
                route,
                fallback: false,
            });
        }

        self.catch_all
            .map(|i| Match {
                route: &self.routes[i],
                fallback: true,
            })
            .ok_or_else(|| Error::RouteNotFound(path.to_string()))
    }

    /// Routes in registration order
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Catch-all route, if any
    pub fn catch_all(&self) -> Option<&Route> {
        self.catch_all.map(|i| &self.routes[i])
    }

    /// Distinct upstream targets in registration order
    pub fn targets(&self) -> Vec<UpstreamTarget> {
        let mut seen = HashSet::new();
        self.routes
            .iter()
            .filter(|route| seen.insert(&route.target))
            .map(|route| route.target.clone())
            .collect()
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::matcher::{rewrite, Match};
    pub use crate::route::{Route, RouteBuilder};
    pub use crate::RouteTable;
}

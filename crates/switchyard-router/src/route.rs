//! Route definition and builder

use std::time::Duration;
use switchyard_config::{normalize_prefix, RouteConfig};
use switchyard_core::{Error, Result, UpstreamTarget};

/// Route definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Normalized path prefix ("/" is the catch-all)
    pub prefix: String,

    /// Upstream this route forwards to
    pub target: UpstreamTarget,

    /// Base path that replaces the matched prefix
    pub rewrite_base: String,

    /// Relay protocol upgrades for this route
    pub allow_upgrade: bool,

    /// Forward the client's Host header unchanged
    pub preserve_host: bool,

    /// Per-upstream timeout; the server default applies when unset
    pub timeout: Option<Duration>,

    /// Health check path override
    pub health_path: Option<String>,
}

impl Route {
    /// Create a new route builder
    pub fn builder() -> RouteBuilder {
        RouteBuilder::new()
    }

    /// Whether this is the catch-all route
    pub fn is_catch_all(&self) -> bool {
        self.prefix == "/"
    }
}

impl TryFrom<&RouteConfig> for Route {
    type Error = Error;

    fn try_from(config: &RouteConfig) -> Result<Self> {
        let mut builder = RouteBuilder::new()
            .prefix(&config.prefix)
            .target(&config.target_host, config.target_port)
            .allow_upgrade(config.allow_upgrade)
            .preserve_host(config.preserve_host);

        if let Some(base) = &config.rewrite_base {
            builder = builder.rewrite_base(base);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(path) = &config.health_path {
            builder = builder.health_path(path);
        }

        builder.build()
    }
}

/// Builder for constructing routes
#[derive(Debug, Default)]
pub struct RouteBuilder {
    prefix: Option<String>,
    target: Option<(String, u16)>,
    rewrite_base: Option<String>,
    allow_upgrade: bool,
    preserve_host: bool,
    timeout: Option<Duration>,
    health_path: Option<String>,
}

impl RouteBuilder {
    /// Create a new route builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the upstream target
    pub fn target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.target = Some((host.into(), port));
        self
    }

    /// Set the rewrite base
    pub fn rewrite_base(mut self, base: impl Into<String>) -> Self {
        self.rewrite_base = Some(base.into());
        self
    }

    /// Allow protocol upgrades
    pub fn allow_upgrade(mut self, allow: bool) -> Self {
        self.allow_upgrade = allow;
        self
    }

    /// Keep the client's Host header
    pub fn preserve_host(mut self, preserve: bool) -> Self {
        self.preserve_host = preserve;
        self
    }

    /// Set the per-upstream timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the health check path
    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = Some(path.into());
        self
    }

    /// Build the route
    pub fn build(self) -> Result<Route> {
        let prefix = self
            .prefix
            .ok_or_else(|| Error::Config("prefix is required".to_string()))?;

        let (host, port) = self
            .target
            .ok_or_else(|| Error::Config(format!("route {prefix}: target is required")))?;

        if !prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "route prefix '{prefix}' must start with '/'"
            )));
        }

        let rewrite_base = self.rewrite_base.unwrap_or_else(|| "/".to_string());
        if !rewrite_base.starts_with('/') {
            return Err(Error::Config(format!(
                "route {prefix}: rewrite_base must start with '/'"
            )));
        }

        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::Config(format!("route {prefix}: timeout must be > 0")));
        }

        Ok(Route {
            prefix: normalize_prefix(&prefix),
            target: UpstreamTarget::new(host, port)?,
            rewrite_base,
            allow_upgrade: self.allow_upgrade,
            preserve_host: self.preserve_host,
            timeout: self.timeout,
            health_path: self.health_path,
        })
    }
}

//! Configuration validation

use crate::types::RouteConfig;
use crate::Config;
use std::collections::HashSet;
use switchyard_core::{Error, Result, UpstreamTarget};

/// Normalize a route prefix: trailing slashes are dropped except for the root
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server(config)?;
    validate_routes(&config.routes)?;
    validate_health(config)?;
    validate_logging(config)?;

    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    let server = &config.server;

    if server.request_timeout.is_zero() {
        return Err(Error::Config("request_timeout must be > 0".to_string()));
    }

    if server.request_timeout.as_secs() > 300 {
        tracing::warn!("request_timeout is very high (>5 minutes)");
    }

    if server.connect_timeout.is_zero() {
        return Err(Error::Config("connect_timeout must be > 0".to_string()));
    }

    if !server.status_path.starts_with('/') {
        return Err(Error::Config("status_path must start with '/'".to_string()));
    }

    if server.cors.enabled {
        if server.cors.allowed_origins.is_empty() {
            return Err(Error::Config(
                "cors.allowed_origins cannot be empty when cors is enabled".to_string(),
            ));
        }
        if server.cors.allowed_methods.is_empty() {
            return Err(Error::Config(
                "cors.allowed_methods cannot be empty when cors is enabled".to_string(),
            ));
        }
    }

    if let Some(root) = &server.static_root {
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "static_root {} is not a directory",
                root.display()
            )));
        }
    }

    Ok(())
}

/// Validate a route list
///
/// Rejects prefixes that do not start with '/', duplicate prefixes (after
/// normalization), more than one catch-all, malformed targets and rewrite
/// bases that do not start with '/'.
pub fn validate_routes(routes: &[RouteConfig]) -> Result<()> {
    let mut seen = HashSet::new();

    for route in routes {
        if !route.prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "route prefix '{}' must start with '/'",
                route.prefix
            )));
        }

        let prefix = normalize_prefix(&route.prefix);
        if !seen.insert(prefix.clone()) {
            return Err(Error::Config(if prefix == "/" {
                "Duplicate catch-all route '/'".to_string()
            } else {
                format!("Duplicate route prefix: {prefix}")
            }));
        }

        UpstreamTarget::new(&route.target_host, route.target_port).map_err(|e| match e {
            Error::Config(message) => Error::Config(format!("route {prefix}: {message}")),
            other => other,
        })?;

        if let Some(base) = &route.rewrite_base {
            if !base.starts_with('/') {
                return Err(Error::Config(format!(
                    "route {prefix}: rewrite_base must start with '/'"
                )));
            }
        }

        if let Some(path) = &route.health_path {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "route {prefix}: health_path must start with '/'"
                )));
            }
        }

        if route.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::Config(format!("route {prefix}: timeout must be > 0")));
        }
    }

    if routes.is_empty() {
        tracing::warn!("No routes configured");
    }

    Ok(())
}

fn validate_health(config: &Config) -> Result<()> {
    let health = &config.health;

    if !health.enabled {
        return Ok(());
    }

    if health.interval.is_zero() {
        return Err(Error::Config("health interval must be > 0".to_string()));
    }

    if health.timeout.is_zero() {
        return Err(Error::Config("health timeout must be > 0".to_string()));
    }

    if !health.path.starts_with('/') {
        return Err(Error::Config("health path must start with '/'".to_string()));
    }

    if !(100..=599).contains(&health.expected_status) {
        return Err(Error::Config(format!(
            "health expected_status {} is not an HTTP status",
            health.expected_status
        )));
    }

    if health.timeout > health.interval {
        tracing::warn!("health timeout is longer than the probe interval");
    }

    Ok(())
}

fn validate_logging(config: &Config) -> Result<()> {
    match config.logging.format.as_str() {
        "text" | "json" => Ok(()),
        other => Err(Error::Config(format!(
            "Invalid logging format: {other} (must be text or json)"
        ))),
    }
}

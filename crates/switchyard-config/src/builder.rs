//! Configuration builder

use crate::types::{
    Config, HealthConfig, LoggingConfig, PoolSettings, RouteConfig, ServerConfig,
};
use std::net::SocketAddr;
use switchyard_core::{Error, Result};

/// Builder for constructing configuration programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    server: Option<ServerConfig>,
    routes: Vec<RouteConfig>,
    health: Option<HealthConfig>,
    pool: Option<PoolSettings>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set server configuration
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Set listen address
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        let server = self
            .server
            .get_or_insert_with(|| ServerConfig::new(addr));
        server.listen = addr;
        self
    }

    /// Append a route
    pub fn add_route(mut self, route: RouteConfig) -> Self {
        self.routes.push(route);
        self
    }

    /// Set health check configuration
    pub fn health(mut self, health: HealthConfig) -> Self {
        self.health = Some(health);
        self
    }

    /// Set connection pool configuration
    pub fn pool(mut self, pool: PoolSettings) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        let server = self
            .server
            .ok_or_else(|| Error::Config("server is required".to_string()))?;

        let config = Config {
            server,
            routes: self.routes,
            health: self.health.unwrap_or_default(),
            pool: self.pool.unwrap_or_default(),
            logging: LoggingConfig::default(),
        };

        crate::validator::validate_config(&config)?;

        Ok(config)
    }
}

//! Connection pool for idle upstream connections

use dashmap::DashMap;
use hyper::client::conn::http1::SendRequest;
use std::time::{Duration, Instant};
use switchyard_config::PoolSettings;
use switchyard_core::{Body, UpstreamTarget};

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle connections per upstream
    pub max_idle_per_upstream: usize,

    /// Idle connection timeout
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_upstream: 32,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl From<&PoolSettings> for PoolConfig {
    fn from(settings: &PoolSettings) -> Self {
        Self {
            max_idle_per_upstream: settings.max_idle_per_upstream,
            idle_timeout: settings.idle_timeout,
        }
    }
}

#[derive(Debug)]
struct IdleConnection {
    sender: SendRequest<Body>,
    idle_since: Instant,
}

impl IdleConnection {
    fn is_usable(&self, idle_timeout: Duration) -> bool {
        !self.sender.is_closed() && self.idle_since.elapsed() < idle_timeout
    }
}

/// Idle HTTP/1.1 connections keyed by upstream target
#[derive(Debug, Default)]
pub struct ConnectionPool {
    config: PoolConfig,
    idle: DashMap<UpstreamTarget, Vec<IdleConnection>>,
}

impl ConnectionPool {
    /// Create a new connection pool
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            idle: DashMap::new(),
        }
    }

    /// Take the most recently used idle connection for `target`
    ///
    /// Closed and expired connections found along the way are dropped. The
    /// caller still has to wait for the sender to become ready.
    pub fn acquire(&self, target: &UpstreamTarget) -> Option<SendRequest<Body>> {
        let mut idle = self.idle.get_mut(target)?;

        while let Some(conn) = idle.pop() {
            if conn.is_usable(self.config.idle_timeout) {
                return Some(conn.sender);
            }
        }

        None
    }

    /// Return a connection that finished its exchange
    ///
    /// Returns `false` when the connection was dropped instead, either
    /// because it is closed or because the idle cap for `target` is reached.
    pub fn release(&self, target: &UpstreamTarget, sender: SendRequest<Body>) -> bool {
        if sender.is_closed() || self.config.max_idle_per_upstream == 0 {
            return false;
        }

        let mut idle = self.idle.entry(target.clone()).or_default();
        idle.retain(|conn| conn.is_usable(self.config.idle_timeout));

        if idle.len() >= self.config.max_idle_per_upstream {
            tracing::trace!(upstream = %target, "Idle pool full, closing connection");
            return false;
        }

        idle.push(IdleConnection {
            sender,
            idle_since: Instant::now(),
        });

        true
    }

    /// Drop every closed or expired idle connection
    pub fn purge_expired(&self) {
        let idle_timeout = self.config.idle_timeout;
        self.idle.retain(|_, idle| {
            idle.retain(|conn| conn.is_usable(idle_timeout));
            !idle.is_empty()
        });
    }

    /// Number of idle connections for `target`
    pub fn idle_count(&self, target: &UpstreamTarget) -> usize {
        self.idle.get(target).map(|idle| idle.len()).unwrap_or(0)
    }

    /// Get configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

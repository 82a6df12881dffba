//! Configuration types

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,

    /// Routes, in registration order
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Active health checking
    #[serde(default)]
    pub health: HealthConfig,

    /// Upstream connection pool
    #[serde(default)]
    pub pool: PoolSettings,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Listen address
    pub listen: SocketAddr,

    /// Default per-upstream timeout (connect + response head)
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Upstream connect timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Graceful shutdown timeout (wait for in-flight connections)
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Path of the built-in status endpoint
    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Directory served for requests no route matches
    #[serde(default)]
    pub static_root: Option<PathBuf>,

    /// Index file served for directory requests under `static_root`
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Cross-origin headers added to every response
    #[serde(default)]
    pub cors: CorsConfig,
}

impl ServerConfig {
    /// Server configuration with defaults for everything but the address
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            status_path: default_status_path(),
            static_root: None,
            index_file: default_index_file(),
            cors: CorsConfig::default(),
        }
    }
}

/// Cross-origin resource sharing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Add CORS headers and answer `OPTIONS` locally
    pub enabled: bool,

    /// Allowed origins; `*` allows any
    pub allowed_origins: Vec<String>,

    /// Methods listed in `Access-Control-Allow-Methods`
    pub allowed_methods: Vec<String>,

    /// Headers listed in `Access-Control-Allow-Headers`
    pub allowed_headers: Vec<String>,

    /// Headers listed in `Access-Control-Expose-Headers`
    pub exposed_headers: Vec<String>,

    /// Preflight cache lifetime
    #[serde(with = "humantime_serde")]
    pub max_age: Option<Duration>,

    /// Send `Access-Control-Allow-Credentials: true`
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allowed_headers: [
                "Origin",
                "X-Requested-With",
                "Content-Type",
                "Accept",
                "Authorization",
            ]
            .map(String::from)
            .to_vec(),
            exposed_headers: Vec::new(),
            max_age: None,
            allow_credentials: false,
        }
    }
}

/// Route configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteConfig {
    /// Path prefix, segment aligned
    pub prefix: String,

    /// Upstream host
    pub target_host: String,

    /// Upstream port
    pub target_port: u16,

    /// Base path that replaces the matched prefix (default "/")
    #[serde(default)]
    pub rewrite_base: Option<String>,

    /// Relay protocol upgrades (websocket and friends)
    #[serde(default)]
    pub allow_upgrade: bool,

    /// Forward the client's Host header instead of the target's
    #[serde(default)]
    pub preserve_host: bool,

    /// Per-upstream timeout overriding `server.request_timeout`
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Health check path overriding `health.path`
    #[serde(default)]
    pub health_path: Option<String>,
}

impl RouteConfig {
    /// Route with defaults for every optional field
    pub fn new(prefix: impl Into<String>, target_host: impl Into<String>, target_port: u16) -> Self {
        Self {
            prefix: prefix.into(),
            target_host: target_host.into(),
            target_port,
            rewrite_base: None,
            allow_upgrade: false,
            preserve_host: false,
            timeout: None,
            health_path: None,
        }
    }
}

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Enable periodic probing
    pub enabled: bool,

    /// Interval between probe rounds
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Timeout for each probe
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Path probed on every upstream
    pub path: String,

    /// Status code that counts as healthy
    pub expected_status: u16,

    /// Answer 503 for routes whose upstream is known unhealthy
    pub short_circuit: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(2),
            path: "/health".to_string(),
            expected_status: 200,
            short_circuit: false,
        }
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum idle connections kept per upstream
    pub max_idle_per_upstream: usize,

    /// Idle connections older than this are discarded
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_per_upstream: 32,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Log format (json, text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// Default functions
fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_status_path() -> String {
    "/__health".to_string()
}

fn default_index_file() -> String {
    "index.html".to_string()
}

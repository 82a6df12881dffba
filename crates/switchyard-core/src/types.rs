//! Common types used throughout Switchyard

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout configuration for upstream exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect: Duration,

    /// Time allowed from dispatch until the upstream response head arrives
    #[serde(with = "humantime_serde")]
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Duration::from_secs(30),
        }
    }
}

/// Forwarding header carrying the client address chain
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Forwarding header carrying the original scheme
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Forwarding header carrying the original Host
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

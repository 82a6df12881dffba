//! Built-in status endpoint

use serde::Serialize;
use switchyard_health::{HealthReporter, HealthSnapshot};

/// Crate version reported by the status endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Liveness payload
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    /// `ok`, or `degraded` when any probed upstream is unhealthy
    pub status: &'static str,

    /// Proxy version
    pub version: &'static str,

    /// Latest health of every probed upstream
    pub upstreams: HealthSnapshot,
}

impl StatusPayload {
    /// Build the payload from the current health snapshot
    pub fn collect(health: Option<&HealthReporter>) -> Self {
        let upstreams = health
            .map(|reporter| reporter.status().as_ref().clone())
            .unwrap_or_default();

        let status = if upstreams.values().all(|status| status.healthy) {
            "ok"
        } else {
            "degraded"
        };

        Self {
            status,
            version: VERSION,
            upstreams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_without_health() {
        let payload = StatusPayload::collect(None);
        assert_eq!(payload.status, "ok");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["version"], VERSION);
        assert!(json["upstreams"].as_object().unwrap().is_empty());
    }
}

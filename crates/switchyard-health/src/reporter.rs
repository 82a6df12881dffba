//! Periodic probing and health snapshots

use crate::checker::{HealthCheck, HttpHealthCheck};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use http::StatusCode;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use switchyard_config::HealthConfig;
use switchyard_core::UpstreamTarget;
use switchyard_router::RouteTable;
use tokio::time::MissedTickBehavior;

/// Health snapshot keyed by `host:port`
pub type HealthSnapshot = HashMap<String, HealthStatus>;

/// Latest known health of one upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// Upstream `host:port`
    pub target: String,

    /// When the last probe finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<DateTime<Utc>>,

    /// Whether the last probe passed
    pub healthy: bool,

    /// Failure reason of the last probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Probe round trip in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    /// Failed probes in a row
    pub consecutive_failures: u32,
}

/// Upstream to probe and the path to probe it on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Upstream
    pub target: UpstreamTarget,
    /// Health check path
    pub path: String,
}

/// Probes every upstream on an interval and publishes immutable snapshots
///
/// Only the [`run`](Self::run) task writes; readers get the whole map at
/// once through [`status`](Self::status) without blocking it.
#[derive(Debug)]
pub struct HealthReporter {
    targets: Vec<ProbeTarget>,
    checker: Arc<dyn HealthCheck>,
    interval: Duration,
    default_path: String,
    snapshot: ArcSwap<HealthSnapshot>,
}

impl HealthReporter {
    /// Create a reporter probing `targets` with an HTTP check built from `config`
    pub fn new(config: &HealthConfig, targets: Vec<ProbeTarget>) -> Self {
        let expected = StatusCode::from_u16(config.expected_status).unwrap_or(StatusCode::OK);
        let checker = Arc::new(HttpHealthCheck::new(expected, config.timeout));

        Self {
            targets,
            checker,
            interval: config.interval,
            default_path: config.path.clone(),
            snapshot: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Create a reporter for every distinct upstream of `routes`
    ///
    /// A route's `health_path` overrides `config.path`; when several routes
    /// share an upstream, the first registered one decides the path.
    pub fn from_routes(config: &HealthConfig, routes: &RouteTable) -> Self {
        let mut targets: Vec<ProbeTarget> = Vec::new();

        for route in routes.routes() {
            if targets.iter().any(|probe| probe.target == route.target) {
                continue;
            }
            targets.push(ProbeTarget {
                target: route.target.clone(),
                path: route
                    .health_path
                    .clone()
                    .unwrap_or_else(|| config.path.clone()),
            });
        }

        Self::new(config, targets)
    }

    /// Replace the health check implementation
    pub fn with_checker(mut self, checker: Arc<dyn HealthCheck>) -> Self {
        self.checker = checker;
        self
    }

    /// Probe a single upstream
    ///
    /// Upstreams outside the probe list use the configured health path.
    /// Does not publish; the failure count continues from the current
    /// snapshot.
    pub async fn probe(&self, target: &UpstreamTarget) -> HealthStatus {
        let path = self
            .targets
            .iter()
            .find(|probe| &probe.target == target)
            .map(|probe| probe.path.as_str())
            .unwrap_or(self.default_path.as_str());

        let key = target.to_string();
        let previous_failures = self
            .snapshot
            .load()
            .get(&key)
            .map(|status| status.consecutive_failures)
            .unwrap_or(0);

        let result = self.checker.check(target, path).await;

        HealthStatus {
            target: key,
            last_check_time: Some(Utc::now()),
            healthy: result.healthy,
            last_error: result.message.filter(|_| !result.healthy),
            latency_ms: Some(result.duration.as_millis() as u64),
            consecutive_failures: if result.healthy {
                0
            } else {
                previous_failures.saturating_add(1)
            },
        }
    }

    /// Probe every upstream concurrently and publish the results
    pub async fn probe_all(&self) -> Arc<HealthSnapshot> {
        let results = join_all(self.targets.iter().map(|probe| self.probe(&probe.target))).await;

        let previous = self.snapshot.load_full();
        let snapshot: HealthSnapshot = results
            .into_iter()
            .map(|status| (status.target.clone(), status))
            .collect();

        for (key, status) in &snapshot {
            let was_healthy = previous.get(key).map(|s| s.healthy).unwrap_or(true);
            if was_healthy && !status.healthy {
                tracing::warn!(
                    upstream = %key,
                    error = status.last_error.as_deref().unwrap_or(""),
                    "Upstream became unhealthy"
                );
            } else if !was_healthy && status.healthy {
                tracing::info!(upstream = %key, "Upstream recovered");
            }
        }

        let snapshot = Arc::new(snapshot);
        self.snapshot.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Probe on every interval tick until `shutdown` resolves
    pub async fn run<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        if self.targets.is_empty() {
            tracing::debug!("No upstreams to probe");
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            upstreams = self.targets.len(),
            interval = ?self.interval,
            "Health reporter started"
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::debug!("Health reporter stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
            }
        }
    }

    /// Current snapshot
    pub fn status(&self) -> Arc<HealthSnapshot> {
        self.snapshot.load_full()
    }

    /// Whether `target` may receive traffic
    ///
    /// Upstreams that have not been probed yet count as healthy.
    pub fn is_healthy(&self, target: &UpstreamTarget) -> bool {
        self.snapshot
            .load()
            .get(&target.to_string())
            .map(|status| status.healthy)
            .unwrap_or(true)
    }

    /// Probed upstreams
    pub fn targets(&self) -> &[ProbeTarget] {
        &self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::HealthCheckResult;
    use crate::testing::{spawn_health_upstream, unused_port};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchyard_router::RouteBuilder;

    fn config() -> HealthConfig {
        HealthConfig {
            interval: Duration::from_millis(50),
            timeout: Duration::from_millis(500),
            ..HealthConfig::default()
        }
    }

    fn probe(port: u16) -> ProbeTarget {
        ProbeTarget {
            target: UpstreamTarget::new("127.0.0.1", port).unwrap(),
            path: "/health".to_string(),
        }
    }

    #[derive(Debug, Default)]
    struct CountingCheck {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HealthCheck for CountingCheck {
        async fn check(&self, _target: &UpstreamTarget, path: &str) -> HealthCheckResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HealthCheckResult::unhealthy(Duration::from_millis(1), format!("down at {path}"))
        }
    }

    #[tokio::test]
    async fn test_unknown_counts_as_healthy() {
        let reporter = HealthReporter::new(&config(), vec![probe(3000)]);
        assert!(reporter.status().is_empty());
        assert!(reporter.is_healthy(&UpstreamTarget::new("127.0.0.1", 3000).unwrap()));
    }

    #[tokio::test]
    async fn test_probe_all_publishes_snapshot() {
        let up = spawn_health_upstream(StatusCode::OK, Duration::ZERO).await;
        let down = unused_port().await;

        let reporter = HealthReporter::new(&config(), vec![probe(up.port()), probe(down)]);
        let snapshot = reporter.probe_all().await;

        let up_key = format!("127.0.0.1:{}", up.port());
        let down_key = format!("127.0.0.1:{down}");

        assert!(snapshot[&up_key].healthy);
        assert!(snapshot[&up_key].last_error.is_none());
        assert!(!snapshot[&down_key].healthy);
        assert_eq!(snapshot[&down_key].consecutive_failures, 1);

        assert!(!reporter.is_healthy(&UpstreamTarget::new("127.0.0.1", down).unwrap()));
        assert_eq!(reporter.status().len(), 2);
    }

    #[tokio::test]
    async fn test_consecutive_failures_accumulate() {
        let reporter = HealthReporter::new(&config(), vec![probe(3000)])
            .with_checker(Arc::new(CountingCheck::default()));

        reporter.probe_all().await;
        reporter.probe_all().await;
        let snapshot = reporter.probe_all().await;

        let status = &snapshot["127.0.0.1:3000"];
        assert_eq!(status.consecutive_failures, 3);
        assert_eq!(status.last_error.as_deref(), Some("down at /health"));
    }

    #[tokio::test]
    async fn test_unlisted_target_uses_configured_path() {
        let config = HealthConfig {
            path: "/status".to_string(),
            ..config()
        };
        let reporter =
            HealthReporter::new(&config, vec![]).with_checker(Arc::new(CountingCheck::default()));

        let status = reporter
            .probe(&UpstreamTarget::new("127.0.0.1", 4000).unwrap())
            .await;
        assert_eq!(status.last_error.as_deref(), Some("down at /status"));
    }

    #[tokio::test]
    async fn test_from_routes_deduplicates_targets() {
        let routes = RouteTable::new(vec![
            RouteBuilder::new()
                .prefix("/api")
                .target("localhost", 3000)
                .health_path("/api/health")
                .build()
                .unwrap(),
            RouteBuilder::new()
                .prefix("/api/v2")
                .target("localhost", 3000)
                .build()
                .unwrap(),
            RouteBuilder::new()
                .prefix("/")
                .target("localhost", 5173)
                .build()
                .unwrap(),
        ])
        .unwrap();

        let reporter = HealthReporter::from_routes(&config(), &routes);
        assert_eq!(reporter.targets().len(), 2);
        assert_eq!(reporter.targets()[0].path, "/api/health");
        assert_eq!(reporter.targets()[1].path, "/health");
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let check = Arc::new(CountingCheck::default());
        let reporter = Arc::new(
            HealthReporter::new(&config(), vec![probe(3000)]).with_checker(check.clone()),
        );

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(Arc::clone(&reporter).run(async move {
            let _ = rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(180)).await;
        tx.send(()).unwrap();
        task.await.unwrap();

        assert!(check.calls.load(Ordering::SeqCst) >= 2);
        assert!(!reporter.is_healthy(&UpstreamTarget::new("127.0.0.1", 3000).unwrap()));
    }

    #[test]
    fn test_status_serialization() {
        let status = HealthStatus {
            target: "localhost:3000".to_string(),
            last_check_time: None,
            healthy: true,
            last_error: None,
            latency_ms: Some(3),
            consecutive_failures: 0,
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["target"], "localhost:3000");
        assert_eq!(json["latency_ms"], 3);
        assert!(json.get("last_error").is_none());
        assert!(json.get("last_check_time").is_none());
    }
}

//! Active health checking for upstream services

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use http_body_util::Empty;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::fmt;
use std::time::{Duration, Instant};
use switchyard_core::UpstreamTarget;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    /// Whether the upstream passed
    pub healthy: bool,
    /// Time taken for the check
    pub duration: Duration,
    /// Optional error message
    pub message: Option<String>,
}

impl HealthCheckResult {
    /// Create a healthy result
    pub fn healthy(duration: Duration) -> Self {
        Self {
            healthy: true,
            duration,
            message: None,
        }
    }

    /// Create an unhealthy result with a message
    pub fn unhealthy(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            duration,
            message: Some(message.into()),
        }
    }
}

/// Trait for performing health checks
#[async_trait]
pub trait HealthCheck: Send + Sync + fmt::Debug {
    /// Probe `path` on the given upstream
    async fn check(&self, target: &UpstreamTarget, path: &str) -> HealthCheckResult;
}

/// HTTP health checker
///
/// Issues a `GET` and compares the response status with the expected one.
#[derive(Debug, Clone)]
pub struct HttpHealthCheck {
    expected_status: StatusCode,
    timeout_duration: Duration,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpHealthCheck {
    /// Create a new HTTP health checker
    pub fn new(expected_status: StatusCode, timeout_duration: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .http1_title_case_headers(true)
            .pool_max_idle_per_host(1)
            .build_http();

        Self {
            expected_status,
            timeout_duration,
            client,
        }
    }
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, target: &UpstreamTarget, path: &str) -> HealthCheckResult {
        let start = Instant::now();
        let url = format!("{}{}", target.base_url(), path);

        debug!(url = %url, "Performing HTTP health check");

        let uri: Uri = match url.parse() {
            Ok(u) => u,
            Err(e) => {
                return HealthCheckResult::unhealthy(start.elapsed(), format!("Invalid URL: {e}"));
            }
        };

        let req = match http::Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Empty::<Bytes>::new())
        {
            Ok(r) => r,
            Err(e) => {
                return HealthCheckResult::unhealthy(
                    start.elapsed(),
                    format!("Failed to build request: {e}"),
                );
            }
        };

        match timeout(self.timeout_duration, self.client.request(req)).await {
            Ok(Ok(response)) => {
                let status = response.status();
                let duration = start.elapsed();

                if status == self.expected_status {
                    debug!(url = %url, status = %status, "Health check passed");
                    HealthCheckResult::healthy(duration)
                } else {
                    warn!(url = %url, status = %status, "Health check failed: unexpected status");
                    HealthCheckResult::unhealthy(duration, format!("Unexpected status code: {status}"))
                }
            }
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Health check failed: request error");
                HealthCheckResult::unhealthy(start.elapsed(), format!("Request error: {e}"))
            }
            Err(_) => {
                warn!(url = %url, "Health check failed: timeout");
                HealthCheckResult::unhealthy(start.elapsed(), "Timeout")
            }
        }
    }
}

//! Request forwarding

use crate::client::UpstreamClient;
use crate::headers::{add_forwarded_headers, is_upgrade_request, set_upgrade, strip_hop_by_hop};
use crate::pool::{ConnectionPool, PoolConfig};
use http::header::{HOST, UPGRADE};
use futures::stream;
use http::{Method, Request, Response, StatusCode, Uri, Version};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_config::Config;
use switchyard_core::response::{empty, incoming};
use switchyard_core::{Body, Error, Result, TimeoutConfig};
use switchyard_router::{rewrite_uri, Route};

/// Forwarder configuration
#[derive(Debug, Clone, Default)]
pub struct ForwarderConfig {
    /// Connect and default request timeouts
    pub timeouts: TimeoutConfig,

    /// Idle connection pool settings
    pub pool: PoolConfig,
}

impl From<&Config> for ForwarderConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeouts: TimeoutConfig {
                connect: config.server.connect_timeout,
                request: config.server.request_timeout,
            },
            pool: PoolConfig::from(&config.pool),
        }
    }
}

/// Streams requests to the upstream of a matched route
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    config: ForwarderConfig,
    tunnels: Arc<AtomicUsize>,
}

impl Forwarder {
    /// Create a new forwarder
    pub fn new(config: ForwarderConfig) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.pool.clone()));
        let client = UpstreamClient::new(pool, config.timeouts.connect);

        Self {
            client,
            config,
            tunnels: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Forward `req` to `route`'s upstream and return its response
    ///
    /// Bodies are streamed in both directions. Errors returned here all
    /// happen before the upstream response head arrived. After that, an
    /// upstream body that stays silent for the route timeout fails with
    /// [`Error::UpstreamTimeout`], which aborts the client connection.
    pub async fn forward(
        &self,
        route: &Route,
        mut req: Request<Body>,
        client_addr: SocketAddr,
    ) -> Result<Response<Body>> {
        let target = &route.target;
        let started = Instant::now();

        let upgrade = if route.allow_upgrade && is_upgrade_request(req.headers()) {
            req.headers()
                .get(UPGRADE)
                .cloned()
                .map(|protocol| (protocol, hyper::upgrade::on(&mut req)))
        } else {
            None
        };

        let path_and_query = rewrite_uri(route, req.uri());
        *req.uri_mut() = path_and_query
            .parse::<Uri>()
            .map_err(|e| Error::MalformedRequest(format!("invalid upstream path: {e}")))?;
        *req.version_mut() = Version::HTTP_11;

        let original_host = req.headers().get(HOST).cloned();
        let headers = req.headers_mut();
        strip_hop_by_hop(headers);
        add_forwarded_headers(headers, client_addr, original_host.as_ref());

        if !route.preserve_host || original_host.is_none() {
            let authority = target.authority()?;
            let host = authority
                .as_str()
                .parse()
                .map_err(|e| Error::Internal(format!("invalid host header: {e}")))?;
            headers.insert(HOST, host);
        }

        let (protocol, client_upgrade) = match upgrade {
            Some((protocol, on_upgrade)) => (Some(protocol), Some(on_upgrade)),
            None => (None, None),
        };
        if let Some(protocol) = &protocol {
            set_upgrade(headers, protocol.clone());
        }

        let method = req.method().clone();
        let timeout = self.timeout_for(route);
        let mut response = self.client.send(target, req, timeout).await?;

        tracing::debug!(
            method = %method,
            path = %path_and_query,
            upstream = %target,
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Upstream responded"
        );

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            let Some(client_upgrade) = client_upgrade else {
                return Err(Error::upstream(
                    target,
                    "switched protocols without an upgrade request",
                ));
            };

            let upstream_protocol = response.headers().get(UPGRADE).cloned();
            let upstream_upgrade = hyper::upgrade::on(&mut response);
            tokio::spawn(relay_upgraded(
                client_upgrade,
                upstream_upgrade,
                target.to_string(),
                TunnelGuard::new(Arc::clone(&self.tunnels)),
            ));

            let (mut parts, _) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            if let Some(protocol) = upstream_protocol.or(protocol) {
                set_upgrade(&mut parts.headers, protocol);
            }

            return Ok(Response::from_parts(parts, empty()));
        }

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        let body = if parts.status == StatusCode::NO_CONTENT || method == Method::HEAD {
            incoming(body)
        } else {
            with_idle_timeout(body, timeout, target.to_string())
        };

        Ok(Response::from_parts(parts, body))
    }

    /// Timeout for connect plus response head on `route`
    pub fn timeout_for(&self, route: &Route) -> Duration {
        route.timeout.unwrap_or(self.config.timeouts.request)
    }

    /// Get configuration
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    /// Get the connection pool
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        self.client.pool()
    }

    /// Number of upgraded connections currently being relayed
    pub fn active_tunnels(&self) -> usize {
        self.tunnels.load(Ordering::Relaxed)
    }
}

/// Stream `body`, failing once no frame arrives within `idle`
fn with_idle_timeout(body: Incoming, idle: Duration, target: String) -> Body {
    let frames = stream::unfold(Some(body), move |state| {
        let target = target.clone();
        async move {
            let mut body = state?;
            match tokio::time::timeout(idle, body.frame()).await {
                Ok(Some(Ok(frame))) => Some((Ok(frame), Some(body))),
                Ok(Some(Err(e))) => Some((Err(Error::from(e)), None)),
                Ok(None) => None,
                Err(_) => {
                    tracing::warn!(
                        upstream = %target,
                        idle_ms = idle.as_millis() as u64,
                        "Upstream body stalled"
                    );
                    Some((Err(Error::UpstreamTimeout(target)), None))
                }
            }
        }
    });

    StreamBody::new(frames).boxed_unsync()
}

/// Counts one relayed tunnel while alive
#[derive(Debug)]
struct TunnelGuard(Arc<AtomicUsize>);

impl TunnelGuard {
    fn new(gauge: Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self(gauge)
    }
}

impl Drop for TunnelGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Relay bytes between both upgraded sides until either one closes
async fn relay_upgraded(
    client: OnUpgrade,
    upstream: OnUpgrade,
    target: String,
    _guard: TunnelGuard,
) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(upstream = %target, error = %e, "Protocol upgrade failed");
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut upstream = TokioIo::new(upstream);

    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((from_client, from_upstream)) => {
            tracing::debug!(
                upstream = %target,
                from_client,
                from_upstream,
                "Upgraded connection closed"
            );
        }
        Err(e) => {
            tracing::debug!(upstream = %target, error = %e, "Upgraded connection ended with error");
        }
    }
}

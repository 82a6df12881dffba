//! Per-request dispatch

use crate::cors::Cors;
use crate::static_files::StaticFiles;
use crate::status::StatusPayload;
use futures::FutureExt;
use http::header::ORIGIN;
use http::{Method, Request, Response, StatusCode};
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use switchyard_core::response::{empty, responses};
use switchyard_core::{Body, Error, ResponseBuilder, Result};
use switchyard_health::HealthReporter;
use switchyard_proxy::Forwarder;
use switchyard_router::RouteTable;
use tracing::{debug, error, info, warn};

/// Routes each request to the status endpoint, an upstream, or the static
/// fallback, and turns every failure into a response
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    forwarder: Forwarder,
    health: Option<Arc<HealthReporter>>,
    static_files: Option<Arc<StaticFiles>>,
    cors: Option<Arc<Cors>>,
    status_path: Arc<str>,
    short_circuit: bool,
    request_count: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(routes: Arc<RouteTable>, forwarder: Forwarder, status_path: impl Into<Arc<str>>) -> Self {
        Self {
            routes,
            forwarder,
            health: None,
            static_files: None,
            cors: None,
            status_path: status_path.into(),
            short_circuit: false,
            request_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Report upstream health on the status endpoint
    ///
    /// With `short_circuit`, requests for upstreams known to be unhealthy
    /// are answered with 503 instead of being forwarded.
    pub fn with_health(mut self, health: Arc<HealthReporter>, short_circuit: bool) -> Self {
        self.health = Some(health);
        self.short_circuit = short_circuit;
        self
    }

    /// Serve files for requests no route matches
    pub fn with_static_files(mut self, files: StaticFiles) -> Self {
        self.static_files = Some(Arc::new(files));
        self
    }

    /// Add CORS headers to every response and answer `OPTIONS` locally
    pub fn with_cors(mut self, cors: Cors) -> Self {
        self.cors = Some(Arc::new(cors));
        self
    }

    /// Handle one request; never fails
    pub async fn dispatch(&self, req: Request<Body>, client_addr: SocketAddr) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let start = Instant::now();

        self.request_count.fetch_add(1, Ordering::Relaxed);

        let origin = req.headers().get(ORIGIN).cloned();

        let mut response = match &self.cors {
            Some(cors) if method == Method::OPTIONS => cors.preflight(),
            _ => guarded(self.handle(req, client_addr)).await,
        };

        if let Some(cors) = &self.cors {
            cors.apply(origin.as_ref(), &mut response);
        }

        info!(
            method = %method,
            path = %path,
            client = %client_addr,
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );

        response
    }

    async fn handle(&self, req: Request<Body>, client_addr: SocketAddr) -> Result<Response<Body>> {
        let is_read = matches!(*req.method(), Method::GET | Method::HEAD);

        if is_read && req.uri().path() == &*self.status_path {
            return ResponseBuilder::new(StatusCode::OK)
                .json_body(&StatusPayload::collect(self.health.as_deref()));
        }

        if req.method() == Method::CONNECT {
            return Err(Error::MalformedRequest("CONNECT is not supported".to_string()));
        }

        if req.uri().scheme().is_some() || req.uri().authority().is_some() {
            return Err(Error::MalformedRequest(format!(
                "absolute-form target {} is not supported",
                req.uri()
            )));
        }

        if !req.uri().path().starts_with('/') {
            return Err(Error::MalformedRequest(format!(
                "request target {} is not a path",
                req.uri()
            )));
        }

        let matched = match self.routes.match_path(req.uri().path()) {
            Ok(matched) => matched,
            Err(Error::RouteNotFound(path)) => {
                if let (true, Some(files)) = (is_read, &self.static_files) {
                    if let Some(response) = files.serve(&path).await? {
                        debug!(path = %path, "Served static file");
                        return Ok(response);
                    }
                }
                return Err(Error::RouteNotFound(path));
            }
            Err(e) => return Err(e),
        };

        let route = matched.route;

        if self.short_circuit {
            if let Some(health) = &self.health {
                if !health.is_healthy(&route.target) {
                    return Err(Error::UpstreamUnhealthy(route.target.to_string()));
                }
            }
        }

        debug!(
            prefix = %route.prefix,
            upstream = %route.target,
            fallback = matched.fallback,
            "Route matched"
        );

        self.forwarder.forward(route, req, client_addr).await
    }

    /// Number of requests dispatched so far
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Route table
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Forwarder
    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }
}

/// Await a request future, mapping errors and panics to responses
async fn guarded<F>(fut: F) -> Response<Body>
where
    F: Future<Output = Result<Response<Body>>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            let status = e.to_status_code();
            if status.is_server_error() {
                warn!(error = %e, status = status.as_u16(), "Request failed");
            } else {
                debug!(error = %e, status = status.as_u16(), "Request rejected");
            }
            error_response(&e)
        }
        Err(_) => {
            error!("Request handler panicked");
            error_response(&Error::Internal("request handler panicked".to_string()))
        }
    }
}

fn error_response(err: &Error) -> Response<Body> {
    responses::error(err).unwrap_or_else(|_| {
        let mut response = Response::new(empty());
        *response.status_mut() = err.to_status_code();
        response
    })
}

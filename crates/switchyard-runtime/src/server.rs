//! HTTP server implementation

use crate::cors::Cors;
use crate::dispatcher::Dispatcher;
use crate::shutdown::ShutdownSignal;
use crate::static_files::StaticFiles;
use crate::RuntimeState;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_config::Config;
use switchyard_core::response::incoming;
use switchyard_core::{Error, Request, Result};
use switchyard_health::{HealthCheck, HealthReporter};
use switchyard_proxy::{Forwarder, ForwarderConfig};
use switchyard_router::RouteTable;
use tokio::net::{TcpListener, TcpStream};

/// HTTP server
#[derive(Debug)]
pub struct Server {
    config: Config,
    dispatcher: Dispatcher,
    health: Option<Arc<HealthReporter>>,
    state: Arc<RwLock<RuntimeState>>,
    shutdown: ShutdownSignal,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Get the current state
    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    /// Get listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.server.listen
    }

    /// Get the dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get the health reporter, if health checking is enabled
    pub fn health(&self) -> Option<&Arc<HealthReporter>> {
        self.health.as_ref()
    }

    /// Get request count
    pub fn request_count(&self) -> u64 {
        self.dispatcher.request_count()
    }

    /// Number of open client connections
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Number of upgraded connections being relayed
    ///
    /// Tunnels outlive the HTTP connection they were upgraded from, so they
    /// are not part of [`Server::active_connections`].
    pub fn active_tunnels(&self) -> usize {
        self.dispatcher.forwarder().active_tunnels()
    }

    /// Get shutdown signal
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    fn set_state(&self, state: RuntimeState) {
        *self.state.write() = state;
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.listen_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })
    }

    /// Bind and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        self.set_state(RuntimeState::Running);

        tracing::info!(
            listen = %local_addr,
            routes = self.dispatcher.routes().len(),
            health_checks = self.health.is_some(),
            "Server listening"
        );

        if let Some(health) = &self.health {
            let shutdown = self.shutdown.clone();
            tokio::spawn(Arc::clone(health).run(async move { shutdown.wait().await }));
        }

        self.spawn_pool_reaper();

        let mut shutdown_rx = self.shutdown.subscribe();
        if !self.shutdown.is_triggered() {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, client_addr)) => {
                                tracing::trace!(client = %client_addr, "Accepted connection");
                                self.spawn_connection(stream, client_addr);
                            }
                            Err(e) => {
                                // Per-connection accept errors (EMFILE, resets) must not stop the listener
                                tracing::error!(error = %e, "Failed to accept connection");
                                tokio::time::sleep(Duration::from_millis(10)).await;
                            }
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        drop(listener);
        self.set_state(RuntimeState::ShuttingDown);
        self.drain().await;
        self.set_state(RuntimeState::Stopped);

        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        let dispatcher = self.dispatcher.clone();
        let shutdown = self.shutdown.clone();
        let guard = ConnectionGuard::new(Arc::clone(&self.active_connections));

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(client = %client_addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tokio::spawn(async move {
            let _guard = guard;

            let service = service_fn(move |req: Request<Incoming>| {
                let dispatcher = dispatcher.clone();
                async move {
                    Ok::<_, Infallible>(dispatcher.dispatch(req.map(incoming), client_addr).await)
                }
            });

            let conn = http1::Builder::new()
                .preserve_header_case(true)
                .title_case_headers(true)
                .serve_connection(TokioIo::new(stream), service)
                .with_upgrades();
            tokio::pin!(conn);

            let mut draining = false;
            let result = loop {
                tokio::select! {
                    result = conn.as_mut() => break result,
                    _ = shutdown.wait(), if !draining => {
                        conn.as_mut().graceful_shutdown();
                        draining = true;
                    }
                }
            };

            if let Err(e) = result {
                tracing::debug!(client = %client_addr, error = %e, "Connection closed with error");
            }
        });
    }

    fn spawn_pool_reaper(&self) {
        let pool = Arc::clone(self.dispatcher.forwarder().pool());
        let period = pool.config().idle_timeout.max(Duration::from_secs(1));
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => pool.purge_expired(),
                    _ = shutdown.wait() => break,
                }
            }
        });
    }

    /// Wait for open connections to finish, up to the shutdown timeout
    async fn drain(&self) {
        let shutdown_timeout = self.config.server.shutdown_timeout;
        let start = Instant::now();

        tracing::info!(
            timeout_secs = shutdown_timeout.as_secs(),
            "Waiting for in-flight connections to complete"
        );

        loop {
            let active = self.active_connections();
            let tunnels = self.active_tunnels();

            if active == 0 && tunnels == 0 {
                tracing::info!("All connections completed, shutting down cleanly");
                break;
            }

            if start.elapsed() >= shutdown_timeout {
                tracing::warn!(
                    active_connections = active,
                    active_tunnels = tunnels,
                    "Shutdown timeout reached, forcing shutdown"
                );
                break;
            }

            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        tracing::info!(
            shutdown_duration_ms = start.elapsed().as_millis() as u64,
            "Server stopped"
        );
    }
}

/// Tracks one open connection in the gauge
#[derive(Debug)]
struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn new(gauge: Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self(gauge)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Server builder
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: Option<Config>,
    shutdown: Option<ShutdownSignal>,
    health_checker: Option<Arc<dyn HealthCheck>>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing shutdown signal
    pub fn shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Replace the HTTP health check
    pub fn health_checker(mut self, checker: Arc<dyn HealthCheck>) -> Self {
        self.health_checker = Some(checker);
        self
    }

    /// Build the server
    pub fn build(self) -> Result<Server> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("config is required".to_string()))?;

        switchyard_config::validate_config(&config)?;

        let routes = Arc::new(RouteTable::load(
            &config.routes,
            config.server.request_timeout,
        )?);

        let forwarder = Forwarder::new(ForwarderConfig::from(&config));
        let mut dispatcher = Dispatcher::new(
            Arc::clone(&routes),
            forwarder,
            config.server.status_path.as_str(),
        );

        let health = if config.health.enabled {
            let mut reporter = HealthReporter::from_routes(&config.health, &routes);
            if let Some(checker) = self.health_checker {
                reporter = reporter.with_checker(checker);
            }
            let reporter = Arc::new(reporter);
            dispatcher = dispatcher.with_health(Arc::clone(&reporter), config.health.short_circuit);
            Some(reporter)
        } else {
            None
        };

        if let Some(root) = &config.server.static_root {
            dispatcher = dispatcher
                .with_static_files(StaticFiles::new(root, config.server.index_file.as_str()));
        }

        if config.server.cors.enabled {
            dispatcher = dispatcher.with_cors(Cors::new(&config.server.cors)?);
        }

        tracing::info!(
            routes = routes.len(),
            upstreams = routes.targets().len(),
            health_checks = health.is_some(),
            static_root = config.server.static_root.is_some(),
            cors = config.server.cors.enabled,
            "Server components initialized"
        );

        Ok(Server {
            config,
            dispatcher,
            health,
            state: Arc::new(RwLock::new(RuntimeState::Initializing)),
            shutdown: self.shutdown.unwrap_or_default(),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }
}

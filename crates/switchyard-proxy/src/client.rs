//! HTTP/1.1 client for upstream exchanges

use crate::pool::ConnectionPool;
use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::client::conn::http1::{Builder, SendRequest};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{Body, Error, Result, UpstreamTarget};
use tokio::net::TcpStream;

/// HTTP client for upstream requests
///
/// Reuses idle connections from a [`ConnectionPool`] and hands a connection
/// back once its response body has been read to the end.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    pool: Arc<ConnectionPool>,
    connect_timeout: Duration,
}

impl UpstreamClient {
    /// Create a new upstream client
    pub fn new(pool: Arc<ConnectionPool>, connect_timeout: Duration) -> Self {
        Self {
            pool,
            connect_timeout,
        }
    }

    /// Open a fresh connection to `target`
    pub async fn connect(&self, target: &UpstreamTarget) -> Result<SendRequest<Body>> {
        let stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(target.connect_addr()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(Error::upstream(target, e)),
            Err(_) => return Err(Error::UpstreamTimeout(target.to_string())),
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(upstream = %target, error = %e, "Failed to set TCP_NODELAY");
        }

        let (sender, conn) = Builder::new()
            .preserve_header_case(true)
            .title_case_headers(true)
            .handshake(TokioIo::new(stream))
            .await
            .map_err(|e| Error::upstream(target, e))?;

        let upstream = target.to_string();
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                tracing::debug!(upstream = %upstream, error = %e, "Upstream connection closed with error");
            }
        });

        tracing::trace!(upstream = %target, "Opened upstream connection");

        Ok(sender)
    }

    /// Get a ready connection, preferring an idle one from the pool
    async fn checkout(&self, target: &UpstreamTarget) -> Result<SendRequest<Body>> {
        while let Some(mut sender) = self.pool.acquire(target) {
            if sender.ready().await.is_ok() {
                tracing::trace!(upstream = %target, "Reusing pooled connection");
                return Ok(sender);
            }
        }

        let mut sender = self.connect(target).await?;
        sender.ready().await.map_err(|e| Error::upstream(target, e))?;
        Ok(sender)
    }

    /// Send a request and wait for the response head
    ///
    /// `timeout` bounds connection setup and the wait for the head. Bodies
    /// are streamed afterwards without a deadline.
    pub async fn send(
        &self,
        target: &UpstreamTarget,
        req: Request<Body>,
        timeout: Duration,
    ) -> Result<Response<Incoming>> {
        match tokio::time::timeout(timeout, self.exchange(target, req)).await {
            Ok(result) => result,
            Err(_) => Err(Error::UpstreamTimeout(target.to_string())),
        }
    }

    async fn exchange(&self, target: &UpstreamTarget, req: Request<Body>) -> Result<Response<Incoming>> {
        let mut sender = self.checkout(target).await?;

        let response = match sender.try_send_request(req).await {
            Ok(response) => response,
            Err(mut e) => match e.take_message() {
                // A pooled connection closed before the request was written;
                // nothing reached the upstream, so a fresh connection is safe.
                Some(req) => {
                    tracing::debug!(upstream = %target, "Pooled connection went stale, reconnecting");
                    sender = self.connect(target).await?;
                    sender.ready().await.map_err(|e| Error::upstream(target, e))?;
                    sender
                        .send_request(req)
                        .await
                        .map_err(|e| Error::upstream(target, e))?
                }
                None => return Err(Error::upstream(target, e.into_error())),
            },
        };

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            self.release_when_idle(target.clone(), sender);
        }

        Ok(response)
    }

    /// Return the connection to the pool once the current response is done
    fn release_when_idle(&self, target: UpstreamTarget, mut sender: SendRequest<Body>) {
        let pool = Arc::clone(&self.pool);
        tokio::spawn(async move {
            if sender.ready().await.is_ok() {
                pool.release(&target, sender);
            }
        });
    }

    /// Get the configured connect timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Get the connection pool
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

//! Shared helpers for end-to-end tests: real hyper upstreams on ephemeral
//! ports and a proxy serving on its own ephemeral port.

#![allow(dead_code)]

use bytes::Bytes;
use http::header::{CONNECTION, HOST, UPGRADE};
use http::{Request, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use switchyard_config::{Config, ConfigBuilder, HealthConfig, RouteConfig, ServerConfig};
use switchyard_runtime::{Server, ServerBuilder, ShutdownSignal};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub type TestBody = UnsyncBoxBody<Bytes, hyper::Error>;

pub fn text(body: impl Into<Bytes>) -> TestBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn no_body() -> TestBody {
    Empty::new().map_err(|never| match never {}).boxed_unsync()
}

/// Run `handler` for every request on a fresh port
pub async fn spawn_upstream<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<TestBody>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let handler = Arc::clone(&handler);
                    async move { Ok::<_, Infallible>(handler(req).await) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .with_upgrades()
                    .await;
            });
        }
    });

    addr
}

/// Upstream that answers `<name> <path-and-query>`, echoes `POST`/`PUT`
/// bodies as they stream in, and reflects the Host it saw in `x-seen-host`
pub async fn spawn_named(name: &'static str) -> SocketAddr {
    spawn_upstream(move |req: Request<Incoming>| async move {
        let host = req
            .headers()
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = if req.method() == http::Method::POST || req.method() == http::Method::PUT {
            req.into_body().boxed_unsync()
        } else {
            let path = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default();
            text(format!("{name} {path}"))
        };

        Response::builder()
            .header("x-upstream", name)
            .header("x-seen-host", host)
            .body(body)
            .unwrap()
    })
    .await
}

/// Upstream that waits `delay` before answering
pub async fn spawn_slow(delay: Duration) -> SocketAddr {
    spawn_upstream(move |_req: Request<Incoming>| async move {
        tokio::time::sleep(delay).await;
        Response::new(text("slow"))
    })
    .await
}

/// Upstream that accepts connections and never writes a byte
pub async fn spawn_silent() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// Upstream that sends a response head promising ten bytes, sends two and
/// then goes quiet
pub async fn spawn_stalled_body() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nab")
                .await;
            held.push(stream);
        }
    });

    addr
}

/// Upstream that switches protocols and echoes raw bytes
pub async fn spawn_upgrade_echo() -> SocketAddr {
    spawn_upstream(|mut req: Request<Incoming>| async move {
        if !req.headers().contains_key(UPGRADE) {
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(text("upgrade required"))
                .unwrap();
        }

        let on_upgrade = hyper::upgrade::on(&mut req);
        tokio::spawn(async move {
            if let Ok(upgraded) = on_upgrade.await {
                let mut io = TokioIo::new(upgraded);
                let mut buf = [0u8; 1024];
                loop {
                    match io.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if io.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header(CONNECTION, "upgrade")
            .header(UPGRADE, "echo")
            .body(no_body())
            .unwrap()
    })
    .await
}

/// A port nothing listens on
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

pub fn route(prefix: &str, addr: SocketAddr) -> RouteConfig {
    RouteConfig::new(prefix, "127.0.0.1", addr.port())
}

/// Validated config with health checks off and short timeouts
pub fn config(routes: Vec<RouteConfig>) -> Config {
    let mut server = ServerConfig::new("127.0.0.1:0".parse().unwrap());
    server.request_timeout = Duration::from_secs(2);
    server.connect_timeout = Duration::from_secs(1);
    server.shutdown_timeout = Duration::from_secs(2);

    routes
        .into_iter()
        .fold(
            ConfigBuilder::new().server(server).health(HealthConfig {
                enabled: false,
                ..HealthConfig::default()
            }),
            |builder, route| builder.add_route(route),
        )
        .build()
        .unwrap()
}

pub struct Proxy {
    pub addr: SocketAddr,
    pub server: Arc<Server>,
    pub shutdown: ShutdownSignal,
    pub handle: JoinHandle<switchyard_core::Result<()>>,
}

/// Serve `config` on an ephemeral port
pub async fn start_proxy(config: Config) -> Proxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Arc::new(ServerBuilder::new().config(config).build().unwrap());
    let shutdown = server.shutdown_signal();
    let serving = Arc::clone(&server);
    let handle = tokio::spawn(async move { serving.serve(listener).await });

    Proxy {
        addr,
        server,
        shutdown,
        handle,
    }
}

/// Send one request on a fresh connection
pub async fn send<B>(addr: SocketAddr, req: Request<B>) -> Response<Incoming>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(conn.with_upgrades());
    sender.send_request(req).await.unwrap()
}

pub async fn get(addr: SocketAddr, path: &str) -> Response<Incoming> {
    let req = Request::get(path)
        .header(HOST, format!("proxy.test:{}", addr.port()))
        .body(Empty::<Bytes>::new())
        .unwrap();
    send(addr, req).await
}

pub async fn body_bytes(response: Response<Incoming>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_text(response: Response<Incoming>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

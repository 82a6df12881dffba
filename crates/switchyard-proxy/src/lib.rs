//! # Switchyard HTTP Proxy
//!
//! Streaming HTTP/1.1 forwarder with:
//! - Per-upstream idle connection pooling
//! - Prefix rewriting and query preservation
//! - Hop-by-hop header removal and `X-Forwarded-*` headers
//! - Protocol upgrade relaying (websockets)
//! - Connect and response-head timeouts

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod client;
pub mod headers;
pub mod pool;
pub mod proxy;

#[cfg(test)]
mod testing;

pub use client::UpstreamClient;
pub use pool::{ConnectionPool, PoolConfig};
pub use proxy::{Forwarder, ForwarderConfig};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::UpstreamClient;
    pub use crate::pool::{ConnectionPool, PoolConfig};
    pub use crate::proxy::{Forwarder, ForwarderConfig};
}

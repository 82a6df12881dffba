//! # Switchyard Core
//!
//! Core types and error handling shared by every Switchyard crate:
//! - The error taxonomy and its HTTP status mapping
//! - Upstream target addressing
//! - The streaming body type used on both sides of the proxy
//! - Response construction helpers

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod response;
pub mod types;
pub mod upstream;

pub use error::{Error, Result};
pub use response::{Body, ResponseBuilder};
pub use types::*;
pub use upstream::UpstreamTarget;

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Method, Request, Response, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::response::{Body, ResponseBuilder};
    pub use crate::types::*;
    pub use crate::upstream::UpstreamTarget;
}

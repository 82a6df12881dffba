//! # Switchyard Health
//!
//! Active upstream health reporting:
//! - HTTP probes with a timeout and an expected status
//! - Concurrent probe rounds on a fixed interval
//! - Lock-free snapshots for the status endpoint and the dispatcher

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod checker;
pub mod reporter;

#[cfg(test)]
mod testing;

pub use checker::{HealthCheck, HealthCheckResult, HttpHealthCheck};
pub use reporter::{HealthReporter, HealthSnapshot, HealthStatus, ProbeTarget};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::checker::{HealthCheck, HealthCheckResult, HttpHealthCheck};
    pub use crate::reporter::{HealthReporter, HealthSnapshot, HealthStatus, ProbeTarget};
}

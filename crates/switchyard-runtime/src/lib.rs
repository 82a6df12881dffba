//! # Switchyard Runtime
//!
//! Listener and request lifecycle:
//! - Binding and accepting with one task per connection
//! - HTTP/1.1 with protocol upgrades
//! - Per-request dispatch with panic isolation
//! - Built-in status endpoint and optional static fallback
//! - Optional CORS headers and preflight answers
//! - Graceful shutdown with signal handling

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod cors;
pub mod dispatcher;
pub mod server;
pub mod shutdown;
pub mod static_files;
pub mod status;

pub use cors::Cors;
pub use dispatcher::Dispatcher;
pub use server::{Server, ServerBuilder};
pub use shutdown::{ShutdownSignal, SignalHandler};
pub use static_files::StaticFiles;
pub use status::{StatusPayload, VERSION};

/// Runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Server is initializing
    Initializing,
    /// Server is running
    Running,
    /// Server is shutting down
    ShuttingDown,
    /// Server is stopped
    Stopped,
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::dispatcher::Dispatcher;
    pub use crate::server::{Server, ServerBuilder};
    pub use crate::shutdown::{ShutdownSignal, SignalHandler};
    pub use crate::RuntimeState;
}

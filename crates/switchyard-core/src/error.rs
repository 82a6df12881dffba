//! Error types for Switchyard

use std::net::SocketAddr;

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Switchyard
///
/// Startup errors (`Config`, `Bind`) are fatal. Everything else is a
/// per-request error and is turned into a response at the dispatcher
/// boundary through [`Error::to_status_code`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Request could not be understood or forwarded as-is
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// No route matches the request path
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Upstream connection error
    #[error("Failed to reach upstream {target}: {message}")]
    UpstreamConnection {
        /// Upstream `host:port`
        target: String,
        /// What went wrong
        message: String,
    },

    /// Upstream did not answer in time
    #[error("Upstream {0} timed out")]
    UpstreamTimeout(String),

    /// Upstream is currently failing its health checks
    #[error("Upstream {0} is unhealthy")]
    UpstreamUnhealthy(String),

    /// Hyper protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// HTTP builder error
    #[error("HTTP error: {0}")]
    HttpError(#[from] http::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Error::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Error::UpstreamConnection { .. } | Error::UpstreamTimeout(_) => StatusCode::BAD_GATEWAY,
            Error::UpstreamUnhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create an upstream connection error
    pub fn upstream(target: impl ToString, message: impl ToString) -> Self {
        Error::UpstreamConnection {
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error may only happen during startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Bind { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::RouteNotFound("/test".to_string()).to_status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::MalformedRequest("bad".to_string()).to_status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::upstream("localhost:3000", "connection refused").to_status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::UpstreamTimeout("localhost:3000".to_string()).to_status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::UpstreamUnhealthy("localhost:3000".to_string()).to_status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::Internal("boom".to_string()).to_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_error_message() {
        let err = Error::upstream("localhost:5173", "connection refused");
        assert_eq!(
            err.to_string(),
            "Failed to reach upstream localhost:5173: connection refused"
        );
    }

    #[test]
    fn test_fatal_errors() {
        let bind = Error::Bind {
            addr: "127.0.0.1:80".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_fatal());
        assert!(Error::Config("bad".to_string()).is_fatal());
        assert!(!Error::RouteNotFound("/".to_string()).is_fatal());
    }
}

//! Upstream target definition

use crate::{Error, Result};
use http::uri::Authority;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single backend identified by host and port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpstreamTarget {
    /// Host name or IP address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl UpstreamTarget {
    /// Create a target, validating the host/port syntax
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let target = Self {
            host: host.into(),
            port,
        };
        target.authority()?;
        Ok(target)
    }

    /// `host:port` authority for the Host header and request URIs
    pub fn authority(&self) -> Result<Authority> {
        if self.host.is_empty() {
            return Err(Error::Config("upstream host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config(format!(
                "upstream {} must have a port > 0",
                self.host
            )));
        }

        let authority = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        };

        authority
            .parse::<Authority>()
            .map_err(|e| Error::Config(format!("invalid upstream '{}': {e}", self.host)))
    }

    /// Address suitable for `TcpStream::connect`
    pub fn connect_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// Get base URL
    pub fn base_url(&self) -> String {
        match self.authority() {
            Ok(authority) => format!("http://{authority}"),
            Err(_) => format!("http://{self}"),
        }
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

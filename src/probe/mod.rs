//! Probe module for site reachability.

mod http;

pub use http::*;

use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("HTTP status {0}")]
    Status(u16),
}

impl ProbeError {
    /// Short classification stored in `ErrorInfo::error_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Network(_) => "network",
            ProbeError::Config(_) => "config",
            ProbeError::Status(_) => "http_status",
        }
    }
}

//! Error types for the discovery system.

use thiserror::Error;

/// Errors raised inside a discovery strategy
///
/// Strategies log and swallow these; a discovery run itself never fails.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Socket creation, multicast send or HTTP failure
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Malformed SSDP reply, descriptor XML or probe body
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Operation timed out")]
    Timeout,

    /// Reply from something that is not a cast receiver
    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

impl From<reqwest::Error> for DiscoveryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            DiscoveryError::Timeout
        } else {
            DiscoveryError::NetworkError(error.to_string())
        }
    }
}

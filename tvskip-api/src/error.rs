use std::time::Duration;

use thiserror::Error;

/// Errors from the cloud and local-network HTTP APIs
///
/// These errors never reach the presentation layer directly. Callers treat
/// them as "try the next endpoint or transport" and log them.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, DNS or body read failure
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// A non-2xx reply
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The reply arrived but could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ApiError {
    /// Whether another attempt against a different endpoint might succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_) | ApiError::Timeout { .. } | ApiError::HttpStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::ParseError(error.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(error: url::ParseError) -> Self {
        ApiError::InvalidParameter(error.to_string())
    }
}

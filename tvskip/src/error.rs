use thiserror::Error;

#[derive(Error, Debug)]
pub enum TvSkipError {
    #[error("API error: {0}")]
    Api(#[from] tvskip_api::ApiError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] tvskip_discovery::DiscoveryError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Pairing code is empty after normalization")]
    InvalidCode,

    #[error("A pairing flow is already in progress")]
    PairingInProgress,

    #[error("Pairing code rejected: {0}")]
    PairingRejected(String),

    #[error("Pairing service unavailable")]
    PairingUnavailable,

    #[error("Pairing cancelled by disconnect")]
    PairingCancelled,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No Tokio runtime available")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, TvSkipError>;

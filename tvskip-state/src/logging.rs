//! Logging setup for tvskip applications
//!
//! Library crates only emit `tracing` events. The application picks a mode
//! once at startup; [`LoggingMode::Silent`] installs nothing so embedding
//! front ends keep full control of stdout and stderr.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable selecting the mode for [`init_logging_from_env`]
pub const LOG_MODE_ENV: &str = "TVSKIP_LOG_MODE";
/// Environment variable overriding the filter directive
pub const LOG_LEVEL_ENV: &str = "TVSKIP_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber installed
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Pretty output at `debug` with source locations
    Debug,
}

impl LoggingMode {
    /// Parse a mode name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" => Some(LoggingMode::Silent),
            "development" | "dev" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LoggingError>;

/// Install a global subscriber for `mode`
///
/// # Environment Variables
///
/// - `TVSKIP_LOG_LEVEL`: filter directive, e.g. `debug` or `tvskip=trace`
/// - `RUST_LOG`: used when `TVSKIP_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `TVSKIP_LOG_MODE`, defaulting to silent
pub fn init_logging_from_env() -> Result<()> {
    let mode = std::env::var(LOG_MODE_ENV)
        .ok()
        .and_then(|name| LoggingMode::from_name(&name))
        .unwrap_or(LoggingMode::Silent);

    init_logging(mode)
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter> {
    let directive = std::env::var(LOG_LEVEL_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    parse_filter(&directive)
}

fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

//! Configuration for the coordinator and its session monitors

use std::time::Duration;

use tvskip_api::ApiConfig;
use tvskip_discovery::DiscoveryConfig;
use tvskip_state::Device;

use crate::error::{Result, TvSkipError};

/// Polling cadence for session monitors
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Tick interval for devices holding a session token (real or synthetic)
    /// Default: 3 seconds
    pub session_interval: Duration,

    /// Tick interval for devices without a session token
    /// Default: 5 seconds
    pub idle_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            session_interval: Duration::from_secs(3),
            idle_interval: Duration::from_secs(5),
        }
    }
}

impl MonitorConfig {
    pub fn interval_for(&self, device: &Device) -> Duration {
        if device.has_session() {
            self.session_interval
        } else {
            self.idle_interval
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_interval.is_zero() || self.idle_interval.is_zero() {
            return Err(TvSkipError::InvalidConfig(
                "monitor intervals must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tvskip::TvSkipConfig;
///
/// let config = TvSkipConfig::default()
///     .with_discovery_window(Duration::from_secs(4))
///     .with_offline_fallback(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct TvSkipConfig {
    pub discovery: DiscoveryConfig,
    pub api: ApiConfig,
    pub monitor: MonitorConfig,

    /// Try the cloud pairing chain on `connect`
    /// Default: true
    pub cloud_pairing: bool,

    /// Fall back to a synthetic session when the pairing chain is exhausted
    /// without an explicit rejection
    /// Default: true
    pub offline_fallback: bool,

    /// Name given to a paired screen that reports none
    /// Default: "TV"
    pub default_device_name: String,

    /// Model recorded for paired screens
    /// Default: "YouTube TV"
    pub paired_model: String,
}

impl Default for TvSkipConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            api: ApiConfig::default(),
            monitor: MonitorConfig::default(),
            cloud_pairing: true,
            offline_fallback: true,
            default_device_name: "TV".to_string(),
            paired_model: "YouTube TV".to_string(),
        }
    }
}

impl TvSkipConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short polling intervals for responsive skipping on a fast network
    pub fn fast_polling() -> Self {
        Self {
            monitor: MonitorConfig {
                session_interval: Duration::from_secs(1),
                idle_interval: Duration::from_secs(2),
            },
            ..Self::default()
        }
    }

    /// Never contact the pairing service; every `connect` yields a
    /// synthetic session
    pub fn offline() -> Self {
        Self {
            cloud_pairing: false,
            offline_fallback: true,
            ..Self::default()
        }
    }

    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_discovery_window(mut self, window: Duration) -> Self {
        self.discovery.window = window;
        self
    }

    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_offline_fallback(mut self, enabled: bool) -> Self {
        self.offline_fallback = enabled;
        self
    }

    pub fn with_cloud_pairing(mut self, enabled: bool) -> Self {
        self.cloud_pairing = enabled;
        self
    }

    pub fn with_default_device_name(mut self, name: impl Into<String>) -> Self {
        self.default_device_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.discovery.validate()?;
        self.api.validate()?;
        self.monitor.validate()?;

        if !self.cloud_pairing && !self.offline_fallback {
            return Err(TvSkipError::InvalidConfig(
                "cloud pairing and offline fallback cannot both be disabled".to_string(),
            ));
        }

        if self.default_device_name.trim().is_empty() {
            return Err(TvSkipError::InvalidConfig(
                "default device name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvskip_state::SessionToken;

    #[test]
    fn test_default_config() {
        let config = TvSkipConfig::default();

        assert!(config.validate().is_ok());
        assert!(config.offline_fallback);
        assert!(config.cloud_pairing);
        assert_eq!(config.discovery.window, Duration::from_secs(8));
        assert_eq!(config.monitor.session_interval, Duration::from_secs(3));
        assert_eq!(config.monitor.idle_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_presets() {
        let fast = TvSkipConfig::fast_polling();
        assert!(fast.monitor.session_interval < MonitorConfig::default().session_interval);
        assert!(fast.validate().is_ok());

        let offline = TvSkipConfig::offline();
        assert!(!offline.cloud_pairing);
        assert!(offline.offline_fallback);
        assert!(offline.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        assert!(TvSkipConfig::offline().with_offline_fallback(false).validate().is_err());
        assert!(TvSkipConfig::default()
            .with_discovery_window(Duration::ZERO)
            .validate()
            .is_err());
        assert!(TvSkipConfig::default()
            .with_monitor(MonitorConfig {
                session_interval: Duration::ZERO,
                idle_interval: Duration::from_secs(5),
            })
            .validate()
            .is_err());
        assert!(TvSkipConfig::default().with_default_device_name("  ").validate().is_err());
    }

    #[test]
    fn test_interval_for_device() {
        let config = MonitorConfig::default();
        let bare = Device::new("tv", "TV", "Chromecast");
        let paired = bare.clone().with_session(SessionToken::new("T1"));
        let synthetic = bare.clone().with_synthetic_session(SessionToken::new("offline-1"));

        assert_eq!(config.interval_for(&bare), Duration::from_secs(5));
        assert_eq!(config.interval_for(&paired), Duration::from_secs(3));
        assert_eq!(config.interval_for(&synthetic), Duration::from_secs(3));
    }
}

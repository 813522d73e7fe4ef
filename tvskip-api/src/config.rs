//! Endpoint and timeout configuration for the HTTP channels

use std::time::Duration;

use crate::error::{ApiError, Result};
use crate::pairing::{default_chain, PairingEndpoint};
use crate::segments::DEFAULT_CATEGORIES;

pub const DEFAULT_CLOUD_BASE_URL: &str = "https://www.youtube.com";
pub const DEFAULT_SEGMENTS_BASE_URL: &str = "https://sponsor.ajay.app";

/// Configuration shared by the pairing, session-binding, DIAL and segment clients
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the cloud pairing and session-binding service
    /// Default: https://www.youtube.com
    pub cloud_base_url: String,

    /// Ordered pairing chain
    /// Default: four endpoints under `cloud_base_url`
    pub pairing_chain: Vec<PairingEndpoint>,

    /// Timeout for session-binding queries and commands
    /// Default: 10 seconds
    pub session_timeout: Duration,

    /// Timeout for local DIAL status queries
    /// Default: 3 seconds
    pub dial_status_timeout: Duration,

    /// Timeout for local DIAL control requests
    /// Default: 5 seconds
    pub dial_control_timeout: Duration,

    /// Base URL of the skip-segment service
    /// Default: https://sponsor.ajay.app
    pub segments_base_url: String,

    /// Segment categories requested from the lookup service
    /// Default: sponsor, intro, outro, interaction, selfpromo
    pub segment_categories: Vec<String>,

    /// Timeout for skip-segment lookups
    /// Default: 5 seconds
    pub segment_timeout: Duration,

    /// Name announced to the TV after pairing
    /// Default: "tvskip"
    pub client_name: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cloud_base_url: DEFAULT_CLOUD_BASE_URL.to_string(),
            pairing_chain: default_chain(DEFAULT_CLOUD_BASE_URL),
            session_timeout: Duration::from_secs(10),
            dial_status_timeout: Duration::from_secs(3),
            dial_control_timeout: Duration::from_secs(5),
            segments_base_url: DEFAULT_SEGMENTS_BASE_URL.to_string(),
            segment_categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            segment_timeout: Duration::from_secs(5),
            client_name: "tvskip".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the cloud channels at `base_url`, rebuilding the default chain
    pub fn with_cloud_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.cloud_base_url = base_url.into();
        self.pairing_chain = default_chain(&self.cloud_base_url);
        self
    }

    pub fn with_pairing_chain(mut self, chain: Vec<PairingEndpoint>) -> Self {
        self.pairing_chain = chain;
        self
    }

    pub fn with_segments_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.segments_base_url = base_url.into();
        self
    }

    pub fn with_segment_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segment_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        for base in [&self.cloud_base_url, &self.segments_base_url] {
            url::Url::parse(base)?;
        }

        if self.pairing_chain.is_empty() {
            return Err(ApiError::InvalidParameter("pairing chain is empty".to_string()));
        }

        for endpoint in &self.pairing_chain {
            url::Url::parse(&endpoint.url)?;
            if !endpoint.body_template.contains("{code}") {
                return Err(ApiError::InvalidParameter(format!(
                    "pairing body template for {} has no {{code}} placeholder",
                    endpoint.url
                )));
            }
            if endpoint.timeout.is_zero() {
                return Err(ApiError::InvalidParameter(format!(
                    "pairing timeout for {} must be greater than zero",
                    endpoint.url
                )));
            }
        }

        if self.segment_categories.is_empty() {
            return Err(ApiError::InvalidParameter(
                "at least one segment category is required".to_string(),
            ));
        }

        let timeouts = [
            self.session_timeout,
            self.dial_status_timeout,
            self.dial_control_timeout,
            self.segment_timeout,
        ];
        if timeouts.iter().any(Duration::is_zero) {
            return Err(ApiError::InvalidParameter(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

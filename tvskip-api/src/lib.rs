//! HTTP channels used by tvskip
//!
//! - [`PairingNegotiator`]: exchanges a TV pairing code for a session token
//! - [`LoungeChannel`]: cloud session-binding queries and commands
//! - [`DialChannel`]: local-network status and control
//! - [`SegmentClient`]: skip-segment lookup
//!
//! All channels share one [`HttpClient`] and report failures as
//! [`ApiError`]. Every base URL comes from [`ApiConfig`] so tests can point
//! the channels at a local mock server.

pub mod client;
pub mod command;
pub mod config;
pub mod dial;
pub mod error;
pub mod lounge;
pub mod pairing;
pub mod playback;
pub mod segments;

pub use client::{HttpClient, HttpResponse};
pub use command::Command;
pub use config::ApiConfig;
pub use dial::DialChannel;
pub use error::{ApiError, Result};
pub use lounge::LoungeChannel;
pub use pairing::{
    normalize_code, AttemptOutcome, PairedScreen, PairingEndpoint, PairingNegotiator, PairingResult,
    ResponseShape,
};
pub use playback::{extract_content_id, NowPlaying};
pub use segments::{Segment, SegmentClient, SegmentLookup};

/// Channels built from one [`ApiConfig`] over a shared client
#[derive(Debug, Clone)]
pub struct Channels {
    pub negotiator: PairingNegotiator,
    pub lounge: LoungeChannel,
    pub dial: DialChannel,
    pub segments: SegmentClient,
}

impl Channels {
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let client = HttpClient::new()?.with_web_origin(config.cloud_base_url.clone());

        Ok(Self {
            negotiator: PairingNegotiator::new(client.clone(), config.pairing_chain.clone()),
            lounge: LoungeChannel::new(client.clone(), &config.cloud_base_url, config.session_timeout)
                .with_client_name(config.client_name.clone()),
            dial: DialChannel::new(
                client.clone(),
                config.dial_status_timeout,
                config.dial_control_timeout,
            ),
            segments: SegmentClient::new(
                client,
                &config.segments_base_url,
                config.segment_categories.clone(),
                config.segment_timeout,
            ),
        })
    }
}

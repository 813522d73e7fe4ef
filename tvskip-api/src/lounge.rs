//! Session-binding channel
//!
//! Once paired, the cloud bind endpoint relays playback queries and control
//! commands to the screen identified by a session token.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tvskip_state::SessionToken;

use crate::client::{require_success, HttpClient};
use crate::command::Command;
use crate::error::Result;
use crate::playback::{parse_now_playing, NowPlaying};

const PROTOCOL_VERSION: u32 = 8;

/// Client for the cloud session-binding endpoint
#[derive(Debug, Clone)]
pub struct LoungeChannel {
    client: HttpClient,
    bind_url: String,
    timeout: Duration,
    client_name: String,
    rid: Arc<AtomicU32>,
}

impl LoungeChannel {
    /// `base_url` is normally `https://www.youtube.com`
    pub fn new(client: HttpClient, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            bind_url: format!("{}/api/lounge/bc/bind", base_url.trim_end_matches('/')),
            timeout,
            client_name: "tvskip".to_string(),
            rid: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Name shown on the TV when this client announces itself
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn bind_url(&self) -> &str {
        &self.bind_url
    }

    fn next_rid(&self) -> u32 {
        self.rid.fetch_add(1, Ordering::SeqCst)
    }

    fn body(&self, token_field: &str, token: &SessionToken, rest: &str) -> String {
        format!(
            "VER={}&RID={}&{}={}&{}",
            PROTOCOL_VERSION,
            self.next_rid(),
            token_field,
            encode(token.as_str()),
            rest
        )
    }

    /// Ask the screen what it is playing
    pub async fn query_now_playing(&self, token: &SessionToken) -> Result<NowPlaying> {
        let body = self.body("lounge_token", token, "req0_getPlayerInfo=1");
        let response = self.client.post_form(&self.bind_url, body, self.timeout).await?;
        let response = require_success(&self.bind_url, response)?;

        let playing = parse_now_playing(&response.body);
        debug!(
            content_id = ?playing.content_id,
            latency_ms = response.latency.as_millis() as u64,
            "lounge player query"
        );
        Ok(playing)
    }

    pub async fn send_command(&self, token: &SessionToken, command: Command) -> Result<()> {
        let body = self.body("lounge_token", token, &command.lounge_field());
        let response = self.client.post_form(&self.bind_url, body, self.timeout).await?;
        let response = require_success(&self.bind_url, response)?;

        debug!(
            command = %command,
            latency_ms = response.latency.as_millis() as u64,
            "lounge command sent"
        );
        Ok(())
    }

    /// Tell the screen a new remote has connected
    pub async fn announce(&self, token: &SessionToken) -> Result<()> {
        let rest = format!("count=0&req0_newClientConnected={}", encode(&self.client_name));
        let body = self.body("loungeIdToken", token, &rest);
        let response = self.client.post_form(&self.bind_url, body, self.timeout).await?;
        require_success(&self.bind_url, response)?;
        Ok(())
    }

    /// Confirm the announced client so the screen keeps it attached
    pub async fn confirm(&self, token: &SessionToken) -> Result<()> {
        let body = self.body("loungeIdToken", token, "count=1&req0_clientConnected=true");
        let response = self.client.post_form(&self.bind_url, body, self.timeout).await?;
        require_success(&self.bind_url, response)?;
        debug!("lounge client confirmed");
        Ok(())
    }

    /// Subscribe to now-playing updates; the reply carries the current item
    pub async fn bind_now_playing(&self, token: &SessionToken) -> Result<NowPlaying> {
        let body = self.body("loungeIdToken", token, "count=0&req0_nowplayingUpdated=true");
        let response = self.client.post_form(&self.bind_url, body, self.timeout).await?;
        let response = require_success(&self.bind_url, response)?;

        let playing = parse_now_playing(&response.body);
        debug!(
            content_id = ?playing.content_id,
            latency_ms = response.latency.as_millis() as u64,
            "lounge now-playing binding"
        );
        Ok(playing)
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

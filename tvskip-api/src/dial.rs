//! Local-network DIAL channel
//!
//! Plain HTTP against the receiver's YouTube application resource. Used when
//! no session token is available but the device address is known.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::debug;

use crate::client::{require_success, HttpClient};
use crate::command::Command;
use crate::error::Result;
use crate::playback::{parse_now_playing, NowPlaying};

const APP_PATH: &str = "/apps/YouTube";

#[derive(Debug, Clone)]
pub struct DialChannel {
    client: HttpClient,
    status_timeout: Duration,
    control_timeout: Duration,
}

impl DialChannel {
    pub fn new(client: HttpClient, status_timeout: Duration, control_timeout: Duration) -> Self {
        Self {
            client,
            status_timeout,
            control_timeout,
        }
    }

    pub fn status_url(addr: SocketAddr) -> String {
        format!("http://{}{}", addr, APP_PATH)
    }

    pub fn control_url(addr: SocketAddr, command: Command) -> String {
        format!("http://{}{}", addr, command.dial_path())
    }

    /// Read the application status document
    pub async fn status(&self, addr: SocketAddr) -> Result<NowPlaying> {
        let url = Self::status_url(addr);
        let response = self.client.get(&url, self.status_timeout).await?;
        let response = require_success(&url, response)?;

        let playing = parse_now_playing(&response.body);
        debug!(
            %addr,
            content_id = ?playing.content_id,
            latency_ms = response.latency.as_millis() as u64,
            "dial status query"
        );
        Ok(playing)
    }

    pub async fn send_command(&self, addr: SocketAddr, command: Command) -> Result<()> {
        let url = Self::control_url(addr, command);
        let response = self.client.post_empty(&url, self.control_timeout).await?;
        let response = require_success(&url, response)?;

        debug!(
            %addr,
            command = %command,
            latency_ms = response.latency.as_millis() as u64,
            "dial command sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn mock_addr(server: &mockito::Server) -> SocketAddr {
        server.host_with_port().parse().unwrap()
    }

    fn channel() -> DialChannel {
        DialChannel::new(
            HttpClient::new().unwrap(),
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_status_extracts_content_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/apps/YouTube")
            .with_status(200)
            .with_body(
                r#"<service xmlns="urn:dial-multiscreen-org:schemas:dial"><name>YouTube</name><state>running</state><additionalData>v=dQw4w9WgXcQ</additionalData></service>"#,
            )
            .create_async()
            .await;

        let playing = channel().status(mock_addr(&server)).await.unwrap();
        assert_eq!(playing.content_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[tokio::test]
    async fn test_status_not_found_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/apps/YouTube")
            .with_status(404)
            .create_async()
            .await;

        assert!(channel().status(mock_addr(&server)).await.is_err());
    }

    #[tokio::test]
    async fn test_seek_posts_to_web_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/apps/YouTube/web-1")
            .match_query(Matcher::UrlEncoded("t".into(), "75".into()))
            .with_status(201)
            .create_async()
            .await;

        channel()
            .send_command(mock_addr(&server), Command::Seek(75.0))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_mute_posts_to_run() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/apps/YouTube/run")
            .with_status(200)
            .create_async()
            .await;

        channel()
            .send_command(mock_addr(&server), Command::Mute)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_urls() {
        let addr: SocketAddr = "192.168.1.100:8008".parse().unwrap();
        assert_eq!(DialChannel::status_url(addr), "http://192.168.1.100:8008/apps/YouTube");
        assert_eq!(
            DialChannel::control_url(addr, Command::Play),
            "http://192.168.1.100:8008/apps/YouTube"
        );
    }
}

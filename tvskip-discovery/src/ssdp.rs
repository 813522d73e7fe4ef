//! SSDP M-SEARCH client
//!
//! Sends one search for DIAL receivers and reads replies until a deadline.

use std::collections::HashSet;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::error::{DiscoveryError, Result};

/// Markers a reply must contain to be worth fetching, matched case-insensitively
const COMPATIBILITY_MARKERS: [&str; 2] = ["dial", "youtube"];

const RECV_BUFFER_SIZE: usize = 2048;

/// Parsed SSDP reply
#[derive(Debug, Clone, PartialEq)]
pub struct SsdpResponse {
    pub location: String,
    pub st: Option<String>,
    pub usn: Option<String>,
    pub server: Option<String>,
}

pub struct SsdpClient {
    socket: UdpSocket,
}

impl SsdpClient {
    pub async fn bind() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to bind UDP socket: {}", e)))?;

        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set multicast loop: {}", e)))?;

        Ok(Self { socket })
    }

    pub async fn search(&self, target: SocketAddr, search_target: &str, mx: u8) -> Result<()> {
        let request = build_search_request(search_target, mx);
        self.socket
            .send_to(request.as_bytes(), target)
            .await
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to send M-SEARCH: {}", e)))?;
        Ok(())
    }

    /// Next compatible reply, or `None` once `deadline` passes
    pub async fn recv_until(&self, deadline: Instant) -> Option<SsdpResponse> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        loop {
            let (size, from) = match timeout_at(deadline, self.socket.recv_from(&mut buffer)).await {
                Err(_) => return None,
                Ok(Err(e)) => {
                    debug!(error = %e, "ssdp receive failed");
                    return None;
                }
                Ok(Ok(received)) => received,
            };

            let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                continue;
            };

            if !is_compatible(text) {
                debug!(%from, "ignoring ssdp reply without a dial marker");
                continue;
            }

            if let Some(response) = parse_ssdp_response(text) {
                return Some(response);
            }
        }
    }

    /// Collect compatible replies until `deadline`, deduplicated by location
    pub async fn collect_until(&self, deadline: Instant) -> Vec<SsdpResponse> {
        let mut seen = HashSet::new();
        let mut responses = Vec::new();

        while let Some(response) = self.recv_until(deadline).await {
            if seen.insert(response.location.clone()) {
                responses.push(response);
            }
        }

        responses
    }
}

pub fn build_search_request(search_target: &str, mx: u8) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: tvskip/{} UPnP/1.0\r\n\
         \r\n",
        mx,
        search_target,
        env!("CARGO_PKG_VERSION")
    )
}

pub fn is_compatible(reply: &str) -> bool {
    let lowered = reply.to_ascii_lowercase();
    COMPATIBILITY_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Parse the headers of an SSDP reply; `LOCATION` is required
pub fn parse_ssdp_response(response: &str) -> Option<SsdpResponse> {
    let mut location = None;
    let mut st = None;
    let mut usn = None;
    let mut server = None;

    for line in response.lines() {
        let line = line.trim();

        if let Some(value) = extract_header_value(line, "LOCATION:") {
            location = Some(value);
        } else if let Some(value) = extract_header_value(line, "ST:") {
            st = Some(value);
        } else if let Some(value) = extract_header_value(line, "USN:") {
            usn = Some(value);
        } else if let Some(value) = extract_header_value(line, "SERVER:") {
            server = Some(value);
        }
    }

    Some(SsdpResponse {
        location: location.filter(|l| !l.is_empty())?,
        st,
        usn,
        server,
    })
}

fn extract_header_value(line: &str, header: &str) -> Option<String> {
    let prefix = line.get(..header.len())?;
    if line.len() > header.len() && prefix.eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}

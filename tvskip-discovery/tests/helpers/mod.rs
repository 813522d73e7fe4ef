//! Test helpers for fixture-based integration tests

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::UdpSocket;

pub const DIAL_ST: &str = "urn:dial-multiscreen-org:service:dial:1";

/// Load a fixture file from `tests/fixtures`
pub fn load_fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(filename);

    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e))
}

/// A receiver described by a DIAL device description fixture
#[derive(Debug, Clone)]
pub struct DialFixture {
    pub name: String,
    pub xml_content: String,
}

impl DialFixture {
    pub fn load(filename: &str) -> Self {
        Self {
            name: filename.to_string(),
            xml_content: load_fixture(filename),
        }
    }

    /// SSDP reply advertising `location`
    pub fn ssdp_response(location: &str, usn_suffix: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\n\
             CACHE-CONTROL: max-age=1800\r\n\
             EXT:\r\n\
             LOCATION: {}\r\n\
             SERVER: Linux/3.8.13+, UPnP/1.0, Portable SDK for UPnP devices/1.6.18\r\n\
             ST: {}\r\n\
             USN: uuid:{}::{}\r\n\r\n",
            location, DIAL_ST, usn_suffix, DIAL_ST
        )
    }
}

/// Fake SSDP responder bound to loopback
///
/// Waits for one M-SEARCH and answers it with the given replies.
pub struct SsdpResponder {
    socket: UdpSocket,
}

impl SsdpResponder {
    pub async fn bind() -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    /// Answer the next M-SEARCH in the background
    pub fn answer_with(self, replies: Vec<String>) -> tokio::task::JoinHandle<String> {
        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];
            let (size, from) = self.socket.recv_from(&mut buffer).await.unwrap();
            let request = String::from_utf8_lossy(&buffer[..size]).to_string();

            for reply in replies {
                self.socket.send_to(reply.as_bytes(), from).await.unwrap();
            }
            request
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_fixture() {
        let fixture = DialFixture::load("chromecast_dial.xml");
        assert!(fixture.xml_content.contains("<?xml"));
        assert!(fixture.xml_content.contains("dial"));
    }

    #[test]
    fn test_ssdp_response() {
        let response = DialFixture::ssdp_response("http://127.0.0.1:8008/dd.xml", "abc");
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("LOCATION: http://127.0.0.1:8008/dd.xml"));
        assert!(response.contains("uuid:abc::"));
    }
}

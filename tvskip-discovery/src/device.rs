//! Descriptor parsing: UPnP/DIAL device description XML and the cast setup
//! API's `eureka_info` JSON.

use std::net::IpAddr;

use serde::Deserialize;
use tvskip_state::Device;

use crate::error::{DiscoveryError, Result};

pub const SSDP_CAPABILITIES: [&str; 2] = ["dial", "youtube"];
pub const PROBE_CAPABILITIES: [&str; 2] = ["cast", "youtube"];

const DEFAULT_SSDP_NAME: &str = "YouTube TV Device";
const DEFAULT_PROBE_NAME: &str = "Cast Device";
const DEFAULT_MODEL: &str = "Unknown";
/// Port assumed when a location URL carries none
const DEFAULT_DIAL_PORT: u16 = 8009;

/// Markers identifying a cast setup API reply, matched case-insensitively
pub const PROBE_MARKERS: [&str; 3] = ["cast", "youtube", "eureka"];

#[derive(Debug, Deserialize)]
struct Root {
    device: DeviceDescription,
}

/// The fields of a UPnP device description that discovery uses
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: Option<String>,
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: Option<String>,
}

impl DeviceDescription {
    pub fn from_xml(xml: &str) -> Result<Self> {
        let root: Root = quick_xml::de::from_str(xml)
            .map_err(|e| DiscoveryError::ParseError(format!("Failed to parse device XML: {}", e)))?;

        Ok(root.device)
    }

    /// UDN without the `uuid:` prefix, if present and non-empty
    pub fn device_id(&self) -> Option<String> {
        let udn = self.udn.as_deref()?.trim();
        let id = udn.strip_prefix("uuid:").unwrap_or(udn);
        (!id.is_empty()).then(|| id.to_string())
    }
}

/// Split a location URL into `(host, ip if literal, port)`
pub fn location_host_port(location: &str) -> Option<(String, Option<IpAddr>, u16)> {
    let url = url::Url::parse(location).ok()?;
    let host = url.host_str()?.to_string();
    let ip = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>().ok();
    let port = url.port().unwrap_or(DEFAULT_DIAL_PORT);
    Some((host, ip, port))
}

/// Build the registry record for an SSDP-discovered receiver
///
/// `description` is `None` when the descriptor was fetched but could not be
/// parsed; the id then falls back to `host:port` of the location.
pub fn device_from_descriptor(location: &str, description: Option<&DeviceDescription>) -> Option<Device> {
    let (host, ip, port) = location_host_port(location)?;

    let id = description
        .and_then(DeviceDescription::device_id)
        .unwrap_or_else(|| format!("{}:{}", host, port));
    let name = description
        .and_then(|d| d.friendly_name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SSDP_NAME.to_string());
    let model = description
        .and_then(|d| d.model_name.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let mut device = Device::new(id, name, model)
        .with_location(location)
        .with_capabilities(SSDP_CAPABILITIES);
    if let Some(ip) = ip {
        device = device.with_address(ip, port);
    }
    Some(device)
}

/// Subset of the cast setup API reply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EurekaInfo {
    pub name: Option<String>,
    pub model_name: Option<String>,
}

pub fn is_cast_setup_reply(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    PROBE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Build the registry record for a receiver that answered a probe
///
/// The body is parsed best effort; malformed JSON falls back to defaults.
pub fn device_from_probe(ip: IpAddr, port: u16, body: &str) -> Device {
    let info: EurekaInfo = serde_json::from_str(body).unwrap_or_default();

    let name = info
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROBE_NAME.to_string());
    let model = info
        .model_name
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let authority = std::net::SocketAddr::new(ip, port);

    Device::new(authority.to_string(), name, model)
        .with_address(ip, port)
        .with_location(format!("http://{}", authority))
        .with_capabilities(PROBE_CAPABILITIES)
}

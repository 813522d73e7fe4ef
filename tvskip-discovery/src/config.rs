//! Discovery configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{DiscoveryError, Result};

/// SSDP multicast group and port
pub const SSDP_MULTICAST_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(239, 255, 255, 250)), 1900);

/// DIAL service search target
pub const DIAL_SEARCH_TARGET: &str = "urn:dial-multiscreen-org:service:dial:1";

/// Ports cast receivers commonly expose their setup API on
pub const DEFAULT_PROBE_PORTS: [u16; 3] = [8008, 8009, 8443];

/// Configuration for a [`DiscoveryEngine`](crate::DiscoveryEngine)
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Total time a run may take before it is cut off
    /// Default: 8 seconds
    pub window: Duration,

    /// Enable the SSDP multicast strategy
    /// Default: true
    pub enable_ssdp: bool,

    /// Where the M-SEARCH is sent
    /// Default: 239.255.255.250:1900
    pub ssdp_target: SocketAddr,

    /// Search target header
    /// Default: urn:dial-multiscreen-org:service:dial:1
    pub search_target: String,

    /// MX header, the maximum reply delay requested from devices
    /// Default: 3
    pub mx: u8,

    /// How long SSDP replies are read
    /// Default: 5 seconds
    pub ssdp_timeout: Duration,

    /// Timeout for fetching a device descriptor
    /// Default: 3 seconds
    pub descriptor_timeout: Duration,

    /// Enable the active probe sweep
    /// Default: true
    pub enable_probe: bool,

    /// Hosts probed by the sweep
    /// Default: .100-.103 on 192.168.1.x, 192.168.0.x and 10.0.0.x
    pub probe_hosts: Vec<IpAddr>,

    /// Ports probed on every host
    /// Default: 8008, 8009, 8443
    pub probe_ports: Vec<u16>,

    /// Timeout for each probe request
    /// Default: 1 second
    pub probe_timeout: Duration,

    /// Upper bound on probe requests per run
    /// Default: 40
    pub max_probes: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(8),
            enable_ssdp: true,
            ssdp_target: SSDP_MULTICAST_ADDR,
            search_target: DIAL_SEARCH_TARGET.to_string(),
            mx: 3,
            ssdp_timeout: Duration::from_secs(5),
            descriptor_timeout: Duration::from_secs(3),
            enable_probe: true,
            probe_hosts: default_probe_hosts(),
            probe_ports: DEFAULT_PROBE_PORTS.to_vec(),
            probe_timeout: Duration::from_secs(1),
            max_probes: 40,
        }
    }
}

fn default_probe_hosts() -> Vec<IpAddr> {
    let subnets: [[u8; 3]; 3] = [[192, 168, 1], [192, 168, 0], [10, 0, 0]];
    subnets
        .iter()
        .flat_map(|[a, b, c]| (100..=103).map(move |d| IpAddr::V4(Ipv4Addr::new(*a, *b, *c, d))))
        .collect()
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multicast only, no probe sweep
    pub fn ssdp_only() -> Self {
        Self {
            enable_probe: false,
            ..Self::default()
        }
    }

    /// Probe sweep only, for networks that drop multicast
    pub fn probe_only() -> Self {
        Self {
            enable_ssdp: false,
            ..Self::default()
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_ssdp_target(mut self, target: SocketAddr) -> Self {
        self.ssdp_target = target;
        self
    }

    pub fn with_ssdp_timeout(mut self, timeout: Duration) -> Self {
        self.ssdp_timeout = timeout;
        self
    }

    pub fn with_probe_hosts(mut self, hosts: Vec<IpAddr>) -> Self {
        self.probe_hosts = hosts;
        self
    }

    pub fn with_probe_ports(mut self, ports: Vec<u16>) -> Self {
        self.probe_ports = ports;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_max_probes(mut self, max: usize) -> Self {
        self.max_probes = max;
        self
    }

    pub fn with_ssdp(mut self, enabled: bool) -> Self {
        self.enable_ssdp = enabled;
        self
    }

    pub fn with_probe(mut self, enabled: bool) -> Self {
        self.enable_probe = enabled;
        self
    }

    /// Probe targets in sweep order, capped at `max_probes`
    pub fn probe_candidates(&self) -> Vec<SocketAddr> {
        self.probe_hosts
            .iter()
            .flat_map(|host| self.probe_ports.iter().map(move |port| SocketAddr::new(*host, *port)))
            .take(self.max_probes)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(DiscoveryError::InvalidConfig(
                "discovery window must be greater than zero".to_string(),
            ));
        }

        if self.enable_ssdp {
            if self.ssdp_timeout.is_zero() || self.descriptor_timeout.is_zero() {
                return Err(DiscoveryError::InvalidConfig(
                    "SSDP timeouts must be greater than zero".to_string(),
                ));
            }
            if self.mx == 0 || self.mx > 5 {
                return Err(DiscoveryError::InvalidConfig(
                    "MX must be between 1 and 5".to_string(),
                ));
            }
        }

        if self.enable_probe && self.probe_timeout.is_zero() {
            return Err(DiscoveryError::InvalidConfig(
                "probe timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

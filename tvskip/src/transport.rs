//! Route selection for queries and commands

use std::fmt;
use std::net::SocketAddr;

use tvskip_state::{Device, SessionToken};

/// How a device can currently be reached
#[derive(Debug, Clone, PartialEq)]
pub enum Transport {
    /// Cloud session-binding channel, real tokens only
    SessionBinding(SessionToken),
    /// DIAL endpoints on the device itself
    LocalNetwork(SocketAddr),
    /// Nothing to talk to; queries are skipped and commands simulated
    Idle,
}

impl Transport {
    /// Prefer the session channel, then the local address
    ///
    /// Synthetic tokens never select the session channel.
    pub fn select(device: &Device) -> Self {
        if device.has_real_session() {
            if let Some(token) = &device.session {
                return Transport::SessionBinding(token.clone());
            }
        }

        match device.socket_addr() {
            Some(addr) => Transport::LocalNetwork(addr),
            None => Transport::Idle,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transport::SessionBinding(_) => "session",
            Transport::LocalNetwork(_) => "local",
            Transport::Idle => "idle",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Transport::Idle)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::LocalNetwork(addr) => write!(f, "local({})", addr),
            other => f.write_str(other.name()),
        }
    }
}

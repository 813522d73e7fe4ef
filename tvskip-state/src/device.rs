//! Device model shared by discovery, pairing and monitoring

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Opaque session token issued by the cloud pairing service
///
/// The token is a credential, so its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken(<redacted, {} chars>)", self.0.len())
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A receiver known to the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique identifier (UDN, `ip:port`, or normalized pairing code)
    pub id: String,
    pub name: String,
    pub model: String,
    pub ip_address: Option<IpAddr>,
    pub port: Option<u16>,
    /// Descriptor location URI
    pub location: Option<String>,
    pub capabilities: BTreeSet<String>,
    #[serde(skip)]
    pub session: Option<SessionToken>,
    pub connected: bool,
    /// True when no real token was ever obtained for this device
    pub synthetic_session: bool,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: model.into(),
            ip_address: None,
            port: None,
            location: None,
            capabilities: BTreeSet::new(),
            session: None,
            connected: false,
            synthetic_session: false,
        }
    }

    pub fn with_address(mut self, ip: IpAddr, port: u16) -> Self {
        self.ip_address = Some(ip);
        self.port = Some(port);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Attach a token obtained from the pairing service
    pub fn with_session(mut self, token: SessionToken) -> Self {
        self.session = Some(token);
        self.synthetic_session = false;
        self
    }

    /// Attach a locally fabricated token used when pairing could not complete
    pub fn with_synthetic_session(mut self, token: SessionToken) -> Self {
        self.session = Some(token);
        self.synthetic_session = true;
        self
    }

    pub fn connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    /// True when the device holds a token the cloud channel will accept
    pub fn has_real_session(&self) -> bool {
        !self.synthetic_session && self.session.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        Some(SocketAddr::new(self.ip_address?, self.port?))
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Merge a newer observation of the same device into this record
    ///
    /// An existing session token and its synthetic flag win, capabilities are
    /// unioned, optional fields are only overwritten by present values and
    /// `connected` is never cleared. Returns whether anything changed.
    pub fn absorb(&mut self, incoming: Device) -> bool {
        let before = self.clone();

        if !incoming.name.is_empty() {
            self.name = incoming.name;
        }
        if !incoming.model.is_empty() {
            self.model = incoming.model;
        }
        if incoming.ip_address.is_some() {
            self.ip_address = incoming.ip_address;
        }
        if incoming.port.is_some() {
            self.port = incoming.port;
        }
        if incoming.location.is_some() {
            self.location = incoming.location;
        }
        self.capabilities.extend(incoming.capabilities);
        if self.session.is_none() && incoming.session.is_some() {
            self.session = incoming.session;
            self.synthetic_session = incoming.synthetic_session;
        }
        self.connected |= incoming.connected;

        *self != before
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.socket_addr() {
            Some(addr) => write!(f, "{} ({}) at {}", self.name, self.model, addr),
            None => write!(f, "{} ({})", self.name, self.model),
        }
    }
}

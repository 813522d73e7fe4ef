//! Change notifications published by the device registry

use crate::device::Device;

/// A change to the registry contents
///
/// Only sent when the registry state actually changed.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryChange {
    /// A device was inserted or its record updated (carries the merged record)
    Upserted(Device),
    ConnectionChanged { id: String, connected: bool },
    Removed(String),
    Cleared,
}

impl RegistryChange {
    /// Identifier of the affected device, `None` for [`RegistryChange::Cleared`]
    pub fn device_id(&self) -> Option<&str> {
        match self {
            RegistryChange::Upserted(device) => Some(&device.id),
            RegistryChange::ConnectionChanged { id, .. } => Some(id),
            RegistryChange::Removed(id) => Some(id),
            RegistryChange::Cleared => None,
        }
    }
}

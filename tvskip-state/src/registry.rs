//! Concurrent device registry
//!
//! The registry is the single serialization point for device records. Every
//! writer (discovery strategies, the pairing path, disconnect) goes through
//! one write lock, so concurrent upserts for the same identifier can never
//! create two entries.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::device::Device;
use crate::event::RegistryChange;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Result of [`DeviceRegistry::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Shared store of known devices
///
/// Cloning is cheap; all clones see the same devices and the same change
/// channel.
///
/// # Example
///
/// ```rust
/// use tvskip_state::{Device, DeviceRegistry};
///
/// let registry = DeviceRegistry::new();
/// registry.upsert(Device::new("tv-1", "Bedroom", "Chromecast"));
/// registry.set_connected("tv-1", true);
///
/// assert!(registry.is_connected("tv-1"));
/// ```
#[derive(Clone)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<String, Device>>>,
    changes: broadcast::Sender<RegistryChange>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }

    /// Insert a device or merge it into the existing record with the same id
    ///
    /// See [`Device::absorb`] for the merge rule.
    pub fn upsert(&self, device: Device) -> UpsertOutcome {
        let mut devices = self.devices.write();

        let (outcome, snapshot) = match devices.get_mut(&device.id) {
            Some(existing) => {
                if !existing.absorb(device) {
                    return UpsertOutcome::Unchanged;
                }
                (UpsertOutcome::Updated, existing.clone())
            }
            None => {
                let snapshot = device.clone();
                devices.insert(device.id.clone(), device);
                (UpsertOutcome::Inserted, snapshot)
            }
        };

        debug!(device_id = %snapshot.id, outcome = ?outcome, "registry upsert");
        // Sent under the lock so subscribers observe changes in commit order
        let _ = self.changes.send(RegistryChange::Upserted(snapshot));
        outcome
    }

    pub fn get(&self, id: &str) -> Option<Device> {
        self.devices.read().get(id).cloned()
    }

    /// All devices, sorted by identifier
    pub fn list(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.read().values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    pub fn remove(&self, id: &str) -> Option<Device> {
        let mut devices = self.devices.write();
        let removed = devices.remove(id);
        if removed.is_some() {
            let _ = self.changes.send(RegistryChange::Removed(id.to_string()));
        }
        removed
    }

    /// Set the connected flag, returning whether the device exists
    pub fn set_connected(&self, id: &str, connected: bool) -> bool {
        let mut devices = self.devices.write();
        let Some(device) = devices.get_mut(id) else {
            return false;
        };

        if device.connected != connected {
            device.connected = connected;
            debug!(device_id = %id, connected, "registry connection changed");
            let _ = self.changes.send(RegistryChange::ConnectionChanged {
                id: id.to_string(),
                connected,
            });
        }
        true
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.devices.read().get(id).is_some_and(|d| d.connected)
    }

    /// Devices whose connected flag is set, sorted by identifier
    pub fn connected(&self) -> Vec<Device> {
        self.list().into_iter().filter(|d| d.connected).collect()
    }

    pub fn clear(&self) {
        let mut devices = self.devices.write();
        if !devices.is_empty() {
            devices.clear();
            let _ = self.changes.send(RegistryChange::Cleared);
        }
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryChange> {
        self.changes.subscribe()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("device_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::sync::broadcast::error::TryRecvError;

    fn probe_device(id: &str) -> Device {
        Device::new(id, "Cast Device", "Unknown").with_capabilities(["cast", "youtube"])
    }

    #[test]
    fn test_upsert_inserts_then_is_idempotent() {
        let registry = DeviceRegistry::new();

        assert_eq!(registry.upsert(probe_device("a")), UpsertOutcome::Inserted);
        assert_eq!(registry.upsert(probe_device("a")), UpsertOutcome::Unchanged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_upsert_existing_updates_in_place() {
        let registry = DeviceRegistry::new();
        registry.upsert(probe_device("a"));

        let renamed = Device::new("a", "Kitchen", "Chromecast Ultra");
        assert_eq!(registry.upsert(renamed), UpsertOutcome::Updated);

        let stored = registry.get("a").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(stored.name, "Kitchen");
        assert!(stored.has_capability("cast"));
    }

    #[test]
    fn test_upsert_does_not_replace_token() {
        let registry = DeviceRegistry::new();
        registry.upsert(Device::new("123456789012", "TV", "YouTube TV").with_session("T1".into()));
        registry.upsert(Device::new("123456789012", "TV", "YouTube TV").with_session("T2".into()));

        let stored = registry.get("123456789012").unwrap();
        assert_eq!(stored.session.unwrap().as_str(), "T1");
    }

    #[test]
    fn test_list_sorted_by_id() {
        let registry = DeviceRegistry::new();
        for id in ["c", "a", "b"] {
            registry.upsert(probe_device(id));
        }

        let ids: Vec<String> = registry.list().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_set_connected(#[case] connected: bool) {
        let registry = DeviceRegistry::new();
        registry.upsert(probe_device("a"));

        assert!(registry.set_connected("a", connected));
        assert_eq!(registry.is_connected("a"), connected);
        assert!(!registry.set_connected("missing", connected));
    }

    #[test]
    fn test_connected_filter() {
        let registry = DeviceRegistry::new();
        registry.upsert(probe_device("a"));
        registry.upsert(probe_device("b"));
        registry.set_connected("b", true);

        let connected: Vec<String> = registry.connected().into_iter().map(|d| d.id).collect();
        assert_eq!(connected, vec!["b"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = DeviceRegistry::new();
        registry.upsert(probe_device("a"));
        registry.upsert(probe_device("b"));

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_changes_only_published_on_real_change() {
        let registry = DeviceRegistry::new();
        let mut changes = registry.subscribe();

        registry.upsert(probe_device("a"));
        registry.upsert(probe_device("a"));
        registry.set_connected("a", false);
        registry.set_connected("a", true);
        registry.remove("missing");
        registry.clear();
        registry.clear();

        assert!(matches!(changes.try_recv(), Ok(RegistryChange::Upserted(d)) if d.id == "a"));
        assert!(matches!(
            changes.try_recv(),
            Ok(RegistryChange::ConnectionChanged { connected: true, .. })
        ));
        assert!(matches!(changes.try_recv(), Ok(RegistryChange::Cleared)));
        assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_same_id_single_entry() {
        let registry = DeviceRegistry::new();
        let mut handles = Vec::new();

        for i in 0..32u8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let device = Device::new("192.168.1.100:8008", "Cast Device", "Unknown")
                    .with_address(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)), 8008)
                    .with_capabilities([format!("cap-{}", i % 4)]);
                registry.upsert(device)
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == UpsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("192.168.1.100:8008").unwrap().capabilities.len(), 4);
    }
}

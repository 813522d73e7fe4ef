//! Shared state for tvskip
//!
//! Holds the pieces every other tvskip crate reads or writes:
//!
//! - **Device model**: [`Device`] and its opaque [`SessionToken`]
//! - **Device registry**: [`DeviceRegistry`], the single serialization point for
//!   device records, with idempotent upsert and change notifications
//! - **Connection status**: [`ConnectionStatus`] and the [`StatusCell`] that
//!   enforces its state machine
//! - **Playback**: [`PlaybackState`] for the content a receiver is showing
//! - **Logging**: [`logging`] helpers on top of `tracing-subscriber`
//!
//! # Quick Start
//!
//! ```rust
//! use tvskip_state::{Device, DeviceRegistry, UpsertOutcome};
//!
//! let registry = DeviceRegistry::new();
//! let tv = Device::new("192.168.1.100:8008", "Living Room", "Chromecast");
//!
//! assert_eq!(registry.upsert(tv.clone()), UpsertOutcome::Inserted);
//! assert_eq!(registry.upsert(tv), UpsertOutcome::Unchanged);
//! assert_eq!(registry.len(), 1);
//! ```
//!
//! # Architecture
//!
//! ```text
//! DeviceRegistry (Clone, shared)
//!     │
//!     ├── devices: RwLock<HashMap<id, Device>>
//!     │
//!     └── changes: broadcast::Sender<RegistryChange>
//!             │
//!             └── subscribers (presentation layer, tests)
//!
//! StatusCell
//!     └── watch::Sender<ConnectionStatus>
//! ```

pub mod device;
pub mod event;
pub mod logging;
pub mod playback;
pub mod registry;
pub mod status;

pub use device::{Device, SessionToken};
pub use event::RegistryChange;
pub use playback::PlaybackState;
pub use registry::{DeviceRegistry, UpsertOutcome};
pub use status::{ConnectionStatus, StatusCell};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::device::{Device, SessionToken};
    pub use crate::event::RegistryChange;
    pub use crate::playback::PlaybackState;
    pub use crate::registry::{DeviceRegistry, UpsertOutcome};
    pub use crate::status::{ConnectionStatus, StatusCell};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_workflow() {
        let registry = DeviceRegistry::new();
        let mut changes = registry.subscribe();

        registry.upsert(Device::new("tv-1", "Bedroom", "Chromecast"));
        registry.set_connected("tv-1", true);

        assert!(registry.is_connected("tv-1"));
        assert!(matches!(changes.try_recv(), Ok(RegistryChange::Upserted(_))));
        assert!(matches!(
            changes.try_recv(),
            Ok(RegistryChange::ConnectionChanged { connected: true, .. })
        ));

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_clone_shares_state() {
        let registry1 = DeviceRegistry::new();
        let registry2 = registry1.clone();

        registry1.upsert(Device::new("tv-1", "Bedroom", "Chromecast"));

        assert_eq!(registry2.get("tv-1").map(|d| d.name), Some("Bedroom".to_string()));
    }
}

//! Cast receiver discovery
//!
//! Finds cast/DIAL receivers on the local network and records them in a
//! shared [`DeviceRegistry`](tvskip_state::DeviceRegistry). Two strategies run
//! concurrently within one bounded window:
//!
//! - **SSDP**: an M-SEARCH for `urn:dial-multiscreen-org:service:dial:1`,
//!   followed by a fetch of each reply's device description
//! - **Probe sweep**: `GET /setup/eureka_info` against a short list of
//!   common receiver addresses, for networks that drop multicast
//!
//! # Quick Start
//!
//! ```no_run
//! use tvskip_discovery::{DiscoveryConfig, DiscoveryEngine};
//! use tvskip_state::DeviceRegistry;
//!
//! # async fn run() -> tvskip_discovery::Result<()> {
//! let registry = DeviceRegistry::new();
//! let engine = DiscoveryEngine::new(DiscoveryConfig::default(), registry.clone())?;
//!
//! let summary = engine.run().await;
//! println!("found {} receivers", summary.total());
//! for device in registry.list() {
//!     println!("{}", device);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
mod discovery;
mod error;
pub mod probe;
pub mod ssdp;

pub use config::{DiscoveryConfig, DEFAULT_PROBE_PORTS, DIAL_SEARCH_TARGET, SSDP_MULTICAST_ADDR};
pub use device::DeviceDescription;
pub use discovery::{DiscoveryEngine, DiscoveryRun, DiscoverySummary};
pub use error::{DiscoveryError, Result};

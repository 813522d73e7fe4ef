//! # tvskip
//!
//! Finds or pairs with a cast receiver, watches what it plays and skips
//! crowd-sourced segments (sponsor reads, intros, outros) by seeking past
//! them.
//!
//! ```rust,no_run
//! use tvskip::{Coordinator, TvSkipConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tvskip::TvSkipError> {
//!     let coordinator = Coordinator::new(TvSkipConfig::default())?;
//!
//!     // Pair with the code shown under Settings > Link with TV code
//!     let tv = coordinator.connect("123 456 789 012").await?;
//!     println!("connected to {}", tv);
//!
//!     let mut playback = coordinator.subscribe_playback();
//!     while playback.changed().await.is_ok() {
//!         if let Some(state) = playback.borrow().clone() {
//!             println!("now playing {}", state.content_id);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! tvskip (Coordinator, SessionMonitor, SegmentGate, CommandDispatcher)
//!     ↓
//! tvskip-discovery (SSDP + probe sweep)    tvskip-api (pairing, lounge, DIAL, segments)
//!     ↓                                        ↓
//! tvskip-state (DeviceRegistry, ConnectionStatus, PlaybackState, logging)
//! ```
//!
//! Only the [`Coordinator`] writes [`ConnectionStatus`]. Monitors hold
//! device ids, never device records, and re-read the registry every tick.

pub mod config;
pub mod coordinator;
pub mod dispatcher;
mod error;
pub mod gate;
pub mod monitor;
pub mod stats;
pub mod transport;

pub use config::{MonitorConfig, TvSkipConfig};
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use dispatcher::{CommandDispatcher, CommandSink, Route};
pub use error::{Result, TvSkipError};
pub use gate::SegmentGate;
pub use monitor::{ChannelSource, MonitorStats, PlaybackSource, SessionMonitor};
pub use stats::{StatsSink, TracingStats};
pub use transport::Transport;

// Re-export commonly used types from the member crates
pub use tvskip_api::{ApiConfig, Command, Segment};
pub use tvskip_discovery::{DiscoveryConfig, DiscoverySummary};
pub use tvskip_state::{logging, ConnectionStatus, Device, DeviceRegistry, PlaybackState, RegistryChange, SessionToken};

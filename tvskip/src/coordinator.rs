//! Coordinator
//!
//! The single entry point the host application constructs. It owns the
//! discovery engine, the pairing flow and the session monitors, and it is
//! the only writer of [`ConnectionStatus`].
//!
//! ```text
//! start_discovery ──► DiscoveryEngine ──► DeviceRegistry
//! connect(code)   ──► PairingNegotiator ──► DeviceRegistry ──► SessionMonitor
//!                                                                  │
//!                      CommandDispatcher ◄── SegmentGate ◄─────────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use tvskip_api::{
    normalize_code, Channels, Command, LoungeChannel, PairedScreen, PairingNegotiator, PairingResult, Segment,
};
use tvskip_discovery::{DiscoveryEngine, DiscoverySummary};
use tvskip_state::{ConnectionStatus, Device, DeviceRegistry, PlaybackState, SessionToken, StatusCell};

use crate::config::TvSkipConfig;
use crate::dispatcher::{CommandDispatcher, CommandSink};
use crate::error::{Result, TvSkipError};
use crate::gate::SegmentGate;
use crate::monitor::{ChannelSource, MonitorStats, SessionMonitor};
use crate::stats::{StatsSink, TracingStats};

/// Capabilities recorded for a screen reached through pairing
pub const PAIRED_CAPABILITIES: [&str; 2] = ["youtube", "sponsorblock"];

/// Prefix of the token given to synthetic sessions
pub const SYNTHETIC_TOKEN_PREFIX: &str = "offline-";

const UNAVAILABLE_REASON: &str = "pairing service unavailable";

struct ActiveDiscovery {
    generation: u64,
    abort: AbortHandle,
}

struct Inner {
    config: TvSkipConfig,
    registry: DeviceRegistry,
    status: StatusCell,
    discovery: DiscoveryEngine,
    active_discovery: Mutex<Option<ActiveDiscovery>>,
    discovery_generation: AtomicU64,
    negotiator: PairingNegotiator,
    lounge: LoungeChannel,
    dispatcher: CommandDispatcher,
    gate: SegmentGate,
    monitor: SessionMonitor,
    pairing: AtomicBool,
    /// Bumped by `disconnect` so an in-flight pairing result is discarded
    pairing_epoch: AtomicU64,
}

/// Handle to the engine; clones share state
///
/// # Example
///
/// ```rust,no_run
/// use tvskip::{Coordinator, TvSkipConfig};
///
/// # async fn run() -> tvskip::Result<()> {
/// let coordinator = Coordinator::new(TvSkipConfig::default())?;
/// let mut status = coordinator.subscribe_status();
///
/// coordinator.start_discovery()?;
/// let device = coordinator.connect("123 456 789 012").await?;
/// println!("paired with {}", device);
///
/// status.changed().await.ok();
/// coordinator.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

/// Builder for [`Coordinator`]
#[derive(Default)]
pub struct CoordinatorBuilder {
    config: Option<TvSkipConfig>,
    registry: Option<DeviceRegistry>,
    stats: Option<Arc<dyn StatsSink>>,
}

impl CoordinatorBuilder {
    pub fn config(mut self, config: TvSkipConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing registry instead of creating one
    pub fn registry(mut self, registry: DeviceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn stats_sink(mut self, stats: Arc<dyn StatsSink>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build(self) -> Result<Coordinator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let registry = self.registry.unwrap_or_default();
        let stats = self.stats.unwrap_or_else(|| Arc::new(TracingStats));
        let channels = Channels::from_config(&config.api)?;

        let dispatcher = CommandDispatcher::new(channels.lounge.clone(), channels.dial.clone());
        let gate = SegmentGate::new(Arc::new(channels.segments), Arc::new(dispatcher.clone()), stats);
        let monitor = SessionMonitor::new(
            registry.clone(),
            Arc::new(ChannelSource::new(channels.lounge.clone(), channels.dial)),
            gate.clone(),
            config.monitor.clone(),
        );
        let discovery = DiscoveryEngine::new(config.discovery.clone(), registry.clone())?;

        Ok(Coordinator {
            inner: Arc::new(Inner {
                config,
                registry,
                status: StatusCell::new(),
                discovery,
                active_discovery: Mutex::new(None),
                discovery_generation: AtomicU64::new(0),
                negotiator: channels.negotiator,
                lounge: channels.lounge,
                dispatcher,
                gate,
                monitor,
                pairing: AtomicBool::new(false),
                pairing_epoch: AtomicU64::new(0),
            }),
        })
    }
}

/// Clears the pairing flag when a `connect` call ends, however it ends
struct PairingGuard<'a>(&'a AtomicBool);

impl<'a> PairingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(TvSkipError::PairingInProgress);
        }
        Ok(Self(flag))
    }
}

impl Drop for PairingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Coordinator {
    pub fn new(config: TvSkipConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    pub fn config(&self) -> &TvSkipConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.inner.registry
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Latest detected playback, `None` when nothing is playing
    pub fn playback(&self) -> Option<PlaybackState> {
        self.inner.monitor.playback()
    }

    pub fn subscribe_playback(&self) -> watch::Receiver<Option<PlaybackState>> {
        self.inner.monitor.subscribe_playback()
    }

    pub fn monitor_stats(&self) -> Vec<MonitorStats> {
        self.inner.monitor.stats()
    }

    pub fn is_pairing(&self) -> bool {
        self.inner.pairing.load(Ordering::SeqCst)
    }

    pub fn is_discovering(&self) -> bool {
        self.inner.active_discovery.lock().is_some()
    }

    // ==================== Discovery ====================

    /// Launch a discovery run and return immediately
    ///
    /// Moves the status to `scanning` only from `disconnected` or `error`;
    /// while connected or connecting the status is left alone. A run already
    /// in progress is replaced.
    pub fn start_discovery(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| TvSkipError::NoRuntime)?;

        self.inner.status.transition_when(
            |current| matches!(current, ConnectionStatus::Disconnected | ConnectionStatus::Error(_)),
            ConnectionStatus::Scanning,
        );

        let run = self.inner.discovery.start();
        let generation = self.inner.discovery_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.inner.active_discovery.lock().replace(ActiveDiscovery {
            generation,
            abort: run.abort_handle(),
        });
        if let Some(previous) = previous {
            debug!(generation = previous.generation, "replacing discovery run");
            previous.abort.abort();
        }

        let inner = Arc::downgrade(&self.inner);
        runtime.spawn(async move {
            let summary = run.wait().await;
            finish_discovery(inner, generation, summary);
        });

        Ok(())
    }

    /// Cancel the running discovery, returning whether one was active
    pub fn stop_discovery(&self) -> bool {
        let Some(active) = self.inner.active_discovery.lock().take() else {
            return false;
        };

        active.abort.abort();
        self.inner
            .status
            .transition_when(|current| *current == ConnectionStatus::Scanning, ConnectionStatus::Disconnected);
        info!(generation = active.generation, "discovery stopped");
        true
    }

    // ==================== Pairing ====================

    /// Pair with a screen using the code it displays
    ///
    /// On success the device is registered as connected and a session
    /// monitor is started for it. When the pairing chain is exhausted
    /// without a rejection and the offline fallback is enabled, the returned
    /// device carries a synthetic session instead.
    pub async fn connect(&self, code: &str) -> Result<Device> {
        let _guard = PairingGuard::acquire(&self.inner.pairing)?;
        let epoch = self.inner.pairing_epoch.load(Ordering::SeqCst);
        let code = normalize_code(code);

        self.inner.status.transition(ConnectionStatus::Connecting);

        if code.is_empty() {
            self.inner
                .status
                .transition(ConnectionStatus::Error("empty pairing code".to_string()));
            return Err(TvSkipError::InvalidCode);
        }

        let result = if self.inner.config.cloud_pairing {
            self.inner.negotiator.negotiate(&code).await
        } else {
            PairingResult::Exhausted { attempts: 0 }
        };

        if self.inner.pairing_epoch.load(Ordering::SeqCst) != epoch {
            info!(code = %code, "pairing result discarded after disconnect");
            return Err(TvSkipError::PairingCancelled);
        }

        match result {
            PairingResult::Paired(screen) => self.complete_pairing(&code, screen),
            PairingResult::Rejected { reason, endpoint } => {
                warn!(code = %code, endpoint = %endpoint, reason = %reason, "pairing rejected");
                self.inner.status.transition(ConnectionStatus::Error(reason.clone()));
                Err(TvSkipError::PairingRejected(reason))
            }
            PairingResult::Exhausted { attempts } if self.inner.config.offline_fallback => {
                warn!(code = %code, attempts, "pairing unavailable, using synthetic session");
                self.start_synthetic_session(&code)
            }
            PairingResult::Exhausted { attempts } => {
                warn!(code = %code, attempts, "pairing unavailable");
                self.inner
                    .status
                    .transition(ConnectionStatus::Error(UNAVAILABLE_REASON.to_string()));
                Err(TvSkipError::PairingUnavailable)
            }
        }
    }

    fn complete_pairing(&self, code: &str, screen: PairedScreen) -> Result<Device> {
        let name = screen
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.inner.config.default_device_name.clone());

        // A real session replaces a synthetic record outright
        if self
            .inner
            .registry
            .get(code)
            .is_some_and(|existing| existing.synthetic_session)
        {
            self.inner.monitor.stop(code);
            self.inner.registry.remove(code);
        }

        let device = Device::new(code, name, self.inner.config.paired_model.clone())
            .with_capabilities(PAIRED_CAPABILITIES)
            .with_session(screen.token)
            .connected(true);

        self.register_connected(device)?;

        // Re-pairing an existing record keeps its stored token
        let device = self.connected_device(code)?;
        if let Some(token) = device.session.clone().filter(|_| device.has_real_session()) {
            self.announce(token);
        }
        Ok(device)
    }

    fn start_synthetic_session(&self, code: &str) -> Result<Device> {
        let token = SessionToken::new(format!("{}{}", SYNTHETIC_TOKEN_PREFIX, code));
        let device = Device::new(code, self.inner.config.default_device_name.clone(), self.inner.config.paired_model.clone())
            .with_capabilities(PAIRED_CAPABILITIES)
            .with_synthetic_session(token)
            .connected(true);

        self.register_connected(device)?;
        self.connected_device(code)
    }

    fn register_connected(&self, device: Device) -> Result<()> {
        let id = device.id.clone();
        let outcome = self.inner.registry.upsert(device);
        self.inner.registry.set_connected(&id, true);
        debug!(device_id = %id, ?outcome, "paired device registered");

        self.inner.status.transition(ConnectionStatus::Connected);
        self.inner.monitor.start(&id)
    }

    fn connected_device(&self, id: &str) -> Result<Device> {
        self.inner
            .registry
            .get(id)
            .ok_or_else(|| TvSkipError::DeviceNotFound(id.to_string()))
    }

    /// Tell the screen a new remote connected, without waiting for it
    fn announce(&self, token: SessionToken) {
        let Ok(runtime) = Handle::try_current() else {
            return;
        };

        let lounge = self.inner.lounge.clone();
        runtime.spawn(async move {
            if let Err(e) = lounge.announce(&token).await {
                debug!(error = %e, "client announcement failed");
                return;
            }
            debug!("client announced to screen");

            match lounge.confirm(&token).await {
                Ok(()) => debug!("client connection confirmed"),
                Err(e) => debug!(error = %e, "client confirmation failed"),
            }
        });
    }

    // ==================== Disconnect ====================

    /// Stop everything, forget every device and return to `disconnected`
    pub fn disconnect(&self) {
        self.inner.pairing_epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(active) = self.inner.active_discovery.lock().take() {
            active.abort.abort();
        }
        self.inner.monitor.stop_all();
        self.inner.registry.clear();
        self.inner.monitor.clear_playback(None);
        self.inner.status.reset();

        info!("disconnected");
    }

    /// Stop monitoring one device and mark it disconnected
    ///
    /// The record stays in the registry. When no connected device remains,
    /// the status returns to `disconnected`.
    pub fn disconnect_device(&self, id: &str) -> Result<()> {
        if self.inner.registry.get(id).is_none() {
            return Err(TvSkipError::DeviceNotFound(id.to_string()));
        }

        self.inner.monitor.stop(id);
        self.inner.registry.set_connected(id, false);
        self.inner.monitor.clear_playback(Some(id));

        if self.inner.registry.connected().is_empty() {
            self.inner
                .status
                .transition_when(ConnectionStatus::is_connected, ConnectionStatus::Disconnected);
        }

        info!(device_id = id, "device disconnected");
        Ok(())
    }

    /// Disconnect and cancel all background work
    pub fn shutdown(&self) {
        self.disconnect();
        info!("coordinator shut down");
    }

    // ==================== Commands ====================

    /// Skip the next segment of whatever is currently playing
    ///
    /// Returns the segment skipped, or `None` when nothing is playing or
    /// nothing is left to skip.
    pub async fn skip(&self) -> Result<Option<Segment>> {
        let Some(playback) = self.playback() else {
            info!("skip requested with nothing playing");
            return Ok(None);
        };

        let device = self
            .inner
            .registry
            .get(&playback.device_id)
            .filter(|d| d.connected)
            .ok_or_else(|| TvSkipError::DeviceNotFound(playback.device_id.clone()))?;

        Ok(self
            .inner
            .gate
            .skip_now(&device, &playback.content_id, playback.position)
            .await)
    }

    pub fn mute(&self) -> usize {
        self.send_to_connected(Command::Mute)
    }

    pub fn unmute(&self) -> usize {
        self.send_to_connected(Command::Unmute)
    }

    pub fn play(&self) -> usize {
        self.send_to_connected(Command::Play)
    }

    pub fn pause(&self) -> usize {
        self.send_to_connected(Command::Pause)
    }

    /// Fire `command` at every connected device, returning how many
    fn send_to_connected(&self, command: Command) -> usize {
        let devices = self.inner.registry.connected();
        if devices.is_empty() {
            warn!(command = %command, "no connected device, command dropped");
            return 0;
        }

        for device in &devices {
            self.inner.dispatcher.send(command, device);
        }
        devices.len()
    }
}

fn finish_discovery(inner: Weak<Inner>, generation: u64, summary: DiscoverySummary) {
    let Some(inner) = inner.upgrade() else {
        return;
    };

    let current = {
        let mut active = inner.active_discovery.lock();
        if active.as_ref().is_some_and(|a| a.generation == generation) {
            active.take();
            true
        } else {
            false
        }
    };

    info!(
        ssdp = summary.ssdp_devices,
        probe = summary.probe_devices,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        timed_out = summary.timed_out,
        cancelled = summary.cancelled,
        "discovery run ended"
    );

    if current {
        inner
            .status
            .transition_when(|status| *status == ConnectionStatus::Scanning, ConnectionStatus::Disconnected);
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("status", &self.status())
            .field("devices", &self.inner.registry.len())
            .field("pairing", &self.is_pairing())
            .finish()
    }
}

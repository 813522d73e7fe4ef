//! Per-device session monitoring
//!
//! One polling task per connected device. A task owns only the device id and
//! re-reads the record from the registry on every tick, so marking a device
//! disconnected (or removing it) ends its loop at the next tick. A reply that
//! arrives after the disconnect is dropped, and segment checks started by a
//! loop are aborted with it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use tvskip_api::{DialChannel, LoungeChannel, NowPlaying};
use tvskip_state::{DeviceRegistry, PlaybackState};

use crate::config::MonitorConfig;
use crate::error::{Result, TvSkipError};
use crate::gate::SegmentGate;
use crate::transport::Transport;

/// Answers "what is playing" over a concrete transport
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Never called with [`Transport::Idle`]
    async fn now_playing(&self, transport: &Transport) -> tvskip_api::Result<NowPlaying>;

    /// First query on a transport; sources that subscribe to updates do it here
    async fn open(&self, transport: &Transport) -> tvskip_api::Result<NowPlaying> {
        self.now_playing(transport).await
    }
}

/// [`PlaybackSource`] backed by the session and DIAL channels
#[derive(Debug, Clone)]
pub struct ChannelSource {
    lounge: LoungeChannel,
    dial: DialChannel,
}

impl ChannelSource {
    pub fn new(lounge: LoungeChannel, dial: DialChannel) -> Self {
        Self { lounge, dial }
    }
}

#[async_trait]
impl PlaybackSource for ChannelSource {
    async fn now_playing(&self, transport: &Transport) -> tvskip_api::Result<NowPlaying> {
        match transport {
            Transport::SessionBinding(token) => self.lounge.query_now_playing(token).await,
            Transport::LocalNetwork(addr) => self.dial.status(*addr).await,
            Transport::Idle => Ok(NowPlaying::default()),
        }
    }

    async fn open(&self, transport: &Transport) -> tvskip_api::Result<NowPlaying> {
        match transport {
            Transport::SessionBinding(token) => self.lounge.bind_now_playing(token).await,
            other => self.now_playing(other).await,
        }
    }
}

/// Snapshot of one monitor task
#[derive(Debug, Clone)]
pub struct MonitorStats {
    pub device_id: String,
    pub poll_count: u64,
    pub consecutive_errors: u32,
    pub started_at: SystemTime,
    pub running: bool,
}

#[derive(Debug, Default)]
struct TaskCounters {
    poll_count: AtomicU64,
    consecutive_errors: AtomicU32,
}

#[derive(Debug)]
struct MonitorTask {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<TaskCounters>,
    started_at: SystemTime,
}

impl MonitorTask {
    fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.handle.abort();
    }
}

/// Everything a loop needs besides its device id
#[derive(Clone)]
struct LoopContext {
    registry: DeviceRegistry,
    source: Arc<dyn PlaybackSource>,
    gate: SegmentGate,
    playback: Arc<watch::Sender<Option<PlaybackState>>>,
    config: MonitorConfig,
}

/// Owns the polling tasks, one per device
#[derive(Clone)]
pub struct SessionMonitor {
    context: LoopContext,
    tasks: Arc<Mutex<HashMap<String, MonitorTask>>>,
}

impl SessionMonitor {
    pub fn new(
        registry: DeviceRegistry,
        source: Arc<dyn PlaybackSource>,
        gate: SegmentGate,
        config: MonitorConfig,
    ) -> Self {
        let (playback, _) = watch::channel(None);

        Self {
            context: LoopContext {
                registry,
                source,
                gate,
                playback: Arc::new(playback),
                config,
            },
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start monitoring `device_id`
    ///
    /// A second start while the loop is still running is a no-op; a finished
    /// loop is replaced.
    pub fn start(&self, device_id: &str) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TvSkipError::NoRuntime)?;
        let mut tasks = self.tasks.lock();

        if let Some(task) = tasks.get(device_id) {
            if !task.handle.is_finished() {
                debug!(device_id, "monitor already running");
                return Ok(());
            }
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(TaskCounters::default());
        let handle = runtime.spawn(polling_loop(
            device_id.to_string(),
            self.context.clone(),
            Arc::clone(&shutdown),
            Arc::clone(&counters),
        ));

        tasks.insert(
            device_id.to_string(),
            MonitorTask {
                handle,
                shutdown,
                counters,
                started_at: SystemTime::now(),
            },
        );
        Ok(())
    }

    /// Cancel the loop for `device_id`, returning whether one existed
    pub fn stop(&self, device_id: &str) -> bool {
        match self.tasks.lock().remove(device_id) {
            Some(task) => {
                task.stop();
                info!(device_id, "monitor stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let tasks: Vec<(String, MonitorTask)> = self.tasks.lock().drain().collect();
        for (device_id, task) in tasks {
            task.stop();
            debug!(device_id = %device_id, "monitor stopped");
        }
    }

    /// Latest playback published by any loop
    pub fn playback(&self) -> Option<PlaybackState> {
        self.context.playback.borrow().clone()
    }

    pub fn subscribe_playback(&self) -> watch::Receiver<Option<PlaybackState>> {
        self.context.playback.subscribe()
    }

    /// Publish "nothing playing", or only for `device_id` when given
    pub fn clear_playback(&self, device_id: Option<&str>) {
        match device_id {
            Some(device_id) => clear_playback(&self.context.playback, device_id),
            None => {
                self.context.playback.send_replace(None);
            }
        }
    }

    pub fn is_running(&self, device_id: &str) -> bool {
        self.tasks
            .lock()
            .get(device_id)
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Statistics for every known task, sorted by device id
    pub fn stats(&self) -> Vec<MonitorStats> {
        let mut stats: Vec<MonitorStats> = self
            .tasks
            .lock()
            .iter()
            .map(|(device_id, task)| MonitorStats {
                device_id: device_id.clone(),
                poll_count: task.counters.poll_count.load(Ordering::Relaxed),
                consecutive_errors: task.counters.consecutive_errors.load(Ordering::Relaxed),
                started_at: task.started_at,
                running: !task.handle.is_finished(),
            })
            .collect();
        stats.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        stats
    }
}

impl std::fmt::Debug for SessionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMonitor")
            .field("tasks", &self.tasks.lock().len())
            .field("config", &self.context.config)
            .finish()
    }
}

async fn polling_loop(
    device_id: String,
    context: LoopContext,
    shutdown: Arc<AtomicBool>,
    counters: Arc<TaskCounters>,
) {
    info!(device_id = %device_id, "monitor started");
    let mut last_content_id: Option<String> = None;
    let mut opened: Option<Transport> = None;
    // Dropped with the loop, which aborts any check still in flight
    let mut gate_tasks = JoinSet::new();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        while gate_tasks.try_join_next().is_some() {}

        let Some(device) = context.registry.get(&device_id).filter(|d| d.connected) else {
            info!(device_id = %device_id, "device no longer connected, monitor ending");
            break;
        };

        let interval = context.config.interval_for(&device);
        let transport = Transport::select(&device);
        counters.poll_count.fetch_add(1, Ordering::Relaxed);

        if !transport.is_idle() {
            let reply = if opened.as_ref() == Some(&transport) {
                context.source.now_playing(&transport).await
            } else {
                debug!(device_id = %device_id, transport = %transport, "opening playback source");
                context.source.open(&transport).await
            };

            if shutdown.load(Ordering::Relaxed) || !context.registry.is_connected(&device_id) {
                info!(device_id = %device_id, "disconnected during playback query, reply dropped");
                break;
            }

            match reply {
                Ok(playing) => {
                    counters.consecutive_errors.store(0, Ordering::Relaxed);
                    opened = Some(transport.clone());

                    match playing.content_id.clone() {
                        Some(content_id) if last_content_id.as_deref() != Some(content_id.as_str()) => {
                            info!(device_id = %device_id, content_id = %content_id, "playback changed");
                            publish(&context.playback, Some(playback_state(&device_id, &content_id, playing)));
                            last_content_id = Some(content_id.clone());

                            let gate = context.gate.clone();
                            gate_tasks.spawn(async move {
                                gate.check(&device, &content_id).await;
                            });
                        }
                        Some(_) => {}
                        None => clear_playback(&context.playback, &device_id),
                    }
                }
                Err(e) => {
                    let errors = counters.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        device_id = %device_id,
                        transport = %transport,
                        consecutive_errors = errors,
                        error = %e,
                        "playback query failed"
                    );
                }
            }
        }

        sleep_unless_shutdown(interval, &shutdown).await;
    }

    debug!(device_id = %device_id, "monitor loop ended");
}

fn playback_state(device_id: &str, content_id: &str, playing: NowPlaying) -> PlaybackState {
    PlaybackState {
        title: playing.title,
        channel: playing.channel,
        duration: playing.duration,
        position: playing.position,
        ..PlaybackState::new(device_id, content_id)
    }
}

fn publish(playback: &watch::Sender<Option<PlaybackState>>, state: Option<PlaybackState>) {
    playback.send_replace(state);
}

/// Drop the published playback only if it belongs to `device_id`
fn clear_playback(playback: &watch::Sender<Option<PlaybackState>>, device_id: &str) {
    playback.send_if_modified(|current| {
        if current.as_ref().is_some_and(|p| p.device_id == device_id) {
            *current = None;
            true
        } else {
            false
        }
    });
}

async fn sleep_unless_shutdown(interval: Duration, shutdown: &AtomicBool) {
    if !shutdown.load(Ordering::Relaxed) {
        tokio::time::sleep(interval).await;
    }
}

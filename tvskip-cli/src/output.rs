//! Terminal output for the `watch` and `discover` commands.
//!
//! Everything the coordinator publishes (status changes, registry changes,
//! playback changes and skips) is funnelled through [`WatchEvent`] so the
//! formatting and the running tallies live in one place.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use tvskip::{ConnectionStatus, Device, PlaybackState, RegistryChange, StatsSink};

/// Something worth printing while watching a receiver
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Status(ConnectionStatus),
    Registry(RegistryChange),
    Playback(Option<PlaybackState>),
    Skipped { duration: f64, category: String },
}

/// Running totals shown when `watch` exits
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WatchStats {
    pub status_changes: u64,
    pub devices_seen: u64,
    pub content_changes: u64,
    pub skips: u64,
    /// Seconds of content skipped
    pub skipped_seconds: f64,
}

impl WatchStats {
    pub fn update(&mut self, event: &WatchEvent) {
        match event {
            WatchEvent::Status(_) => self.status_changes += 1,
            WatchEvent::Registry(RegistryChange::Upserted(_)) => self.devices_seen += 1,
            WatchEvent::Registry(_) => {}
            WatchEvent::Playback(Some(_)) => self.content_changes += 1,
            WatchEvent::Playback(None) => {}
            WatchEvent::Skipped { duration, .. } => {
                self.skips += 1;
                self.skipped_seconds += duration;
            }
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} skip(s) saving {:.1}s across {} video(s); {} status change(s), {} device update(s)",
            self.skips, self.skipped_seconds, self.content_changes, self.status_changes, self.devices_seen
        )
    }
}

/// Formats [`WatchEvent`]s as timestamped, optionally coloured lines
#[derive(Debug, Clone)]
pub struct EventFormatter {
    use_colors: bool,
}

impl EventFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn format_event(&self, event: &WatchEvent) -> String {
        self.format_event_at(event, Local::now())
    }

    fn format_event_at(&self, event: &WatchEvent, at: DateTime<Local>) -> String {
        let timestamp = at.format("%Y-%m-%d %H:%M:%S%.3f");

        match event {
            WatchEvent::Status(status) => {
                let color = match status {
                    ConnectionStatus::Connected => "\x1b[32m",
                    ConnectionStatus::Error(_) => "\x1b[31m",
                    _ => "\x1b[34m",
                };
                self.format_with_color(&format!("[{}] STATUS: {}", timestamp, status), color)
            }
            WatchEvent::Registry(change) => {
                let line = match change {
                    RegistryChange::Upserted(device) => format!("DEVICE: {}", describe_device(device)),
                    RegistryChange::ConnectionChanged { id, connected } => {
                        format!("DEVICE: {} {}", id, if *connected { "connected" } else { "disconnected" })
                    }
                    RegistryChange::Removed(id) => format!("DEVICE: {} removed", id),
                    RegistryChange::Cleared => "DEVICE: registry cleared".to_string(),
                };
                self.format_with_color(&format!("[{}] {}", timestamp, line), "\x1b[36m")
            }
            WatchEvent::Playback(Some(state)) => self.format_with_color(
                &format!("[{}] NOW_PLAYING: {}", timestamp, describe_playback(state)),
                "\x1b[35m",
            ),
            WatchEvent::Playback(None) => {
                self.format_with_color(&format!("[{}] NOW_PLAYING: nothing", timestamp), "\x1b[37m")
            }
            WatchEvent::Skipped { duration, category } => self.format_with_color(
                &format!("[{}] SKIPPED: {} ({:.1}s)", timestamp, category, duration),
                "\x1b[33m",
            ),
        }
    }

    fn format_with_color(&self, text: &str, color_code: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }
}

pub fn describe_device(device: &Device) -> String {
    let mut line = format!("{} [{}] {}", device.name, device.id, device.model);
    if let Some(addr) = device.socket_addr() {
        line.push_str(&format!(" at {}", addr));
    }
    if device.synthetic_session {
        line.push_str(" (offline session)");
    } else if device.has_real_session() {
        line.push_str(" (paired)");
    }
    line
}

pub fn describe_playback(state: &PlaybackState) -> String {
    let mut line = match &state.title {
        Some(title) => format!("{} ({})", title, state.content_id),
        None => state.content_id.clone(),
    };
    if let Some(channel) = &state.channel {
        line.push_str(&format!(" by {}", channel));
    }
    match (state.position, state.duration) {
        (Some(position), Some(duration)) => line.push_str(&format!(" at {:.0}/{:.0}s", position, duration)),
        (Some(position), None) => line.push_str(&format!(" at {:.0}s", position)),
        _ => {}
    }
    line
}

/// Device table printed by `discover`
pub fn device_table(devices: &[Device]) -> String {
    if devices.is_empty() {
        return "No receivers found. Check that the TV is on and on the same network.".to_string();
    }

    let mut sorted: Vec<&Device> = devices.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let mut table = format!("Found {} receiver(s):\n", sorted.len());
    for device in sorted {
        table.push_str(&format!("  - {}\n", describe_device(device)));
    }
    table
}

/// Forwards skip notifications into the watch event stream
pub struct ChannelStats {
    events: Mutex<Option<mpsc::UnboundedSender<WatchEvent>>>,
}

impl ChannelStats {
    pub fn new(events: mpsc::UnboundedSender<WatchEvent>) -> Self {
        Self {
            events: Mutex::new(Some(events)),
        }
    }

    /// Stop forwarding so the receiving end can drain and finish
    pub fn close(&self) {
        self.events.lock().take();
    }
}

impl StatsSink for ChannelStats {
    fn record_skip(&self, duration: f64, category: &str) {
        tracing::info!(duration, category, "segment skipped");
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(WatchEvent::Skipped {
                duration,
                category: category.to_string(),
            });
        }
    }
}

//! Playback control commands and their wire encodings

use std::fmt;

/// A playback-control command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Seek to an absolute position in seconds
    Seek(f64),
    Mute,
    Unmute,
    Play,
    Pause,
}

/// Volume restored by [`Command::Unmute`]
pub const UNMUTE_VOLUME: u8 = 50;

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Seek(_) => "seek",
            Command::Mute => "mute",
            Command::Unmute => "unmute",
            Command::Play => "play",
            Command::Pause => "pause",
        }
    }

    /// The `req0_*` field appended to a session-binding form body
    pub fn lounge_field(&self) -> String {
        match self {
            Command::Seek(seconds) => format!("req0_seekTo={}", whole_seconds(*seconds)),
            Command::Mute => "req0_setVolume=0".to_string(),
            Command::Unmute => format!("req0_setVolume={}", UNMUTE_VOLUME),
            Command::Play => "req0_play=".to_string(),
            Command::Pause => "req0_pause=".to_string(),
        }
    }

    /// Path and query of the local DIAL control request (always a POST)
    pub fn dial_path(&self) -> String {
        match self {
            Command::Seek(seconds) => format!("/apps/YouTube/web-1?t={}", whole_seconds(*seconds)),
            Command::Mute | Command::Unmute => "/apps/YouTube/run".to_string(),
            Command::Play | Command::Pause => "/apps/YouTube".to_string(),
        }
    }
}

fn whole_seconds(seconds: f64) -> i64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as i64
    } else {
        0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Seek(seconds) => write!(f, "seek({:.1})", seconds),
            other => f.write_str(other.name()),
        }
    }
}

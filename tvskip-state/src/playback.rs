use serde::{Deserialize, Serialize};

/// What a receiver is currently playing
///
/// Overwritten on every detected change. Absence of playback is modelled as
/// `Option<PlaybackState>::None` by consumers, not as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub device_id: String,
    pub content_id: String,
    pub title: Option<String>,
    pub channel: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    /// Seconds
    pub position: Option<f64>,
}

impl PlaybackState {
    pub fn new(device_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            content_id: content_id.into(),
            title: None,
            channel: None,
            duration: None,
            position: None,
        }
    }
}

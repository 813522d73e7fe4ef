//! Content identifier and metadata extraction from status replies
//!
//! Session-binding and DIAL replies are not stable documents, so extraction
//! is pattern based and best effort.

use std::sync::LazyLock;

use regex::Regex;

/// Length of a valid content identifier
pub const CONTENT_ID_LEN: usize = 11;

static CONTENT_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#""videoId"\s*:\s*"([A-Za-z0-9_-]+)""#,
        r"videoId=([A-Za-z0-9_-]+)",
        r"video_id=([A-Za-z0-9_-]+)",
        r"watch\?v=([A-Za-z0-9_-]+)",
        r"v=([A-Za-z0-9_-]+)",
    ])
});

static TITLE_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r#""title"\s*:\s*"([^"]+)""#, r"<title>([^<]+)</title>"]));

static CHANNEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#""author"\s*:\s*"([^"]+)""#,
        r#""channelName"\s*:\s*"([^"]+)""#,
    ])
});

static DURATION_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r#""duration"\s*:\s*"?([0-9]+(?:\.[0-9]+)?)"#]));

static POSITION_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r#""currentTime"\s*:\s*"?([0-9]+(?:\.[0-9]+)?)"#]));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

/// What a status reply says is playing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub content_id: Option<String>,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub position: Option<f64>,
}

/// First well-formed content id found by the ordered patterns
pub fn extract_content_id(body: &str) -> Option<String> {
    CONTENT_ID_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|id| id.len() == CONTENT_ID_LEN)
            .map(str::to_string)
    })
}

pub fn parse_now_playing(body: &str) -> NowPlaying {
    NowPlaying {
        content_id: extract_content_id(body),
        title: first_capture(&TITLE_PATTERNS, body),
        channel: first_capture(&CHANNEL_PATTERNS, body),
        duration: first_capture(&DURATION_PATTERNS, body).and_then(|s| s.parse().ok()),
        position: first_capture(&POSITION_PATTERNS, body).and_then(|s| s.parse().ok()),
    }
}

fn first_capture(patterns: &[Regex], body: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

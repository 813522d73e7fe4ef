//! Cloud code pairing
//!
//! The user reads a numeric code off the TV; [`PairingNegotiator`] walks an
//! ordered chain of pairing endpoints until one yields a session token, one
//! explicitly rejects the code, or the chain runs out.
//!
//! Replies are loosely specified, so each 2xx body goes through:
//!
//! 1. rejection markers (`invalid`, `expired`)
//! 2. a structured parse into a [`ResponseShape`], tried in fixed order
//! 3. a JSON `error` or `error_code` field, only when no token was found
//! 4. ordered textual patterns as a last resort

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use tvskip_state::SessionToken;

use crate::client::HttpClient;

const REJECTION_MARKERS: [&str; 2] = ["invalid", "expired"];
const TOKEN_MARKERS: [&str; 2] = ["token", "screen"];
const TOKEN_KEYS: [&str; 4] = ["lounge_token", "loungeToken", "loungeIdToken", "token"];
const NAME_KEYS: [&str; 3] = ["name", "screenName", "screen_name"];
const ERROR_KEYS: [&str; 2] = ["error", "error_code"];
const MAX_NESTED_DEPTH: usize = 4;

static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"lounge_token["']?[:\s]*["']?([A-Za-z0-9_-]+)"#,
        r#"token["']?[:\s]*["']?([A-Za-z0-9_-]+)"#,
        r#""([A-Za-z0-9_-]{20,})""#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Strip whitespace and hyphens from a user-entered code
///
/// ```rust
/// assert_eq!(tvskip_api::normalize_code("123 456-789-012"), "123456789012");
/// ```
pub fn normalize_code(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
}

/// One endpoint in the pairing chain
#[derive(Debug, Clone, PartialEq)]
pub struct PairingEndpoint {
    pub url: String,
    /// Form body with a `{code}` placeholder
    pub body_template: String,
    pub timeout: Duration,
}

impl PairingEndpoint {
    pub fn new(url: impl Into<String>, body_template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            body_template: body_template.into(),
            timeout,
        }
    }

    /// Render the form body for an already normalized code
    pub fn render_body(&self, code: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(code.as_bytes()).collect();
        self.body_template.replace("{code}", &encoded)
    }
}

/// The default chain against `base_url` (normally `https://www.youtube.com`)
pub fn default_chain(base_url: &str) -> Vec<PairingEndpoint> {
    let base = base_url.trim_end_matches('/');
    vec![
        PairingEndpoint::new(
            format!("{}/api/lounge/pairing/get_screen", base),
            "pairing_code={code}",
            Duration::from_secs(20),
        ),
        PairingEndpoint::new(
            format!("{}/api/lounge/pairing/get_lounge_token_batch", base),
            "screen_ids={code}",
            Duration::from_secs(20),
        ),
        PairingEndpoint::new(
            format!("{}/api/lounge/pairing/get_screen_id", base),
            "screen_ids={code}",
            Duration::from_secs(15),
        ),
        PairingEndpoint::new(
            format!("{}/tv_remote_control/pairing", base),
            "screen_ids={code}",
            Duration::from_secs(15),
        ),
    ]
}

/// A screen that accepted the code
#[derive(Debug, Clone, PartialEq)]
pub struct PairedScreen {
    pub token: SessionToken,
    pub name: Option<String>,
}

/// Token and name pulled out of one screen object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScreenEntry {
    pub token: Option<String>,
    pub name: Option<String>,
}

impl ScreenEntry {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            token: first_string(object, &TOKEN_KEYS),
            name: first_string(object, &NAME_KEYS),
        }
    }

    fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn into_paired(self) -> Option<PairedScreen> {
        let token = self.token.filter(|t| !t.is_empty())?;
        Some(PairedScreen {
            token: SessionToken::new(token),
            name: self.name.filter(|n| !n.is_empty()),
        })
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
}

/// The closed set of reply shapes understood by the structured parse
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `{"screens": [{...}, ...]}`
    ScreenList(ScreenEntry),
    /// `{"screen": {...}}`
    SingleScreen(ScreenEntry),
    /// Token fields on the top-level object
    FlatToken(ScreenEntry),
    /// Token found inside a wrapper such as `{"data": {...}}`
    Nested(ScreenEntry),
}

impl ResponseShape {
    /// Classify a decoded body, returning the first shape that carries a token
    pub fn classify(value: &Value) -> Option<ResponseShape> {
        let object = value.as_object()?;

        if let Some(Value::Array(screens)) = object.get("screens") {
            let entry = screens
                .iter()
                .filter_map(Value::as_object)
                .map(ScreenEntry::from_object)
                .find(ScreenEntry::has_token);
            if let Some(entry) = entry {
                return Some(ResponseShape::ScreenList(entry));
            }
        }

        if let Some(Value::Object(screen)) = object.get("screen") {
            let entry = ScreenEntry::from_object(screen);
            if entry.has_token() {
                return Some(ResponseShape::SingleScreen(entry));
            }
        }

        let entry = ScreenEntry::from_object(object);
        if entry.has_token() {
            return Some(ResponseShape::FlatToken(entry));
        }

        object
            .values()
            .find_map(|child| search_nested(child, 1))
            .map(ResponseShape::Nested)
    }

    pub fn into_entry(self) -> ScreenEntry {
        match self {
            ResponseShape::ScreenList(entry)
            | ResponseShape::SingleScreen(entry)
            | ResponseShape::FlatToken(entry)
            | ResponseShape::Nested(entry) => entry,
        }
    }
}

fn search_nested(value: &Value, depth: usize) -> Option<ScreenEntry> {
    if depth > MAX_NESTED_DEPTH {
        return None;
    }
    match value {
        Value::Object(object) => {
            let entry = ScreenEntry::from_object(object);
            if entry.has_token() {
                return Some(entry);
            }
            object.values().find_map(|child| search_nested(child, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|item| search_nested(item, depth + 1)),
        _ => None,
    }
}

/// Result of a single endpoint attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Nothing usable, try the next endpoint
    Inconclusive(String),
    /// The service refused the code; the chain stops
    Rejected(String),
    Paired(PairedScreen),
}

/// Result of running the whole chain
#[derive(Debug, Clone, PartialEq)]
pub enum PairingResult {
    Paired(PairedScreen),
    Rejected { reason: String, endpoint: String },
    Exhausted { attempts: usize },
}

/// Classify one 2xx reply body
pub fn interpret_body(body: &str) -> AttemptOutcome {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return AttemptOutcome::Inconclusive("empty body".to_string());
    }

    let decoded = serde_json::from_str::<Value>(trimmed).ok();

    let lowered = trimmed.to_ascii_lowercase();
    if let Some(marker) = REJECTION_MARKERS.iter().find(|marker| lowered.contains(*marker)) {
        return AttemptOutcome::Rejected(format!("pairing code {}", marker));
    }

    let has_token_marker = TOKEN_MARKERS.iter().any(|marker| lowered.contains(marker));
    if has_token_marker {
        let structured = decoded
            .as_ref()
            .and_then(ResponseShape::classify)
            .and_then(|shape| shape.into_entry().into_paired());
        if let Some(screen) = structured {
            return AttemptOutcome::Paired(screen);
        }
    }

    // A JSON error only counts once no token could be extracted
    if let Some(reason) = json_error(decoded.as_ref()) {
        return AttemptOutcome::Rejected(reason);
    }

    if !has_token_marker {
        return AttemptOutcome::Inconclusive("no token marker in reply".to_string());
    }

    match token_from_text(trimmed) {
        Some(token) => AttemptOutcome::Paired(PairedScreen {
            token: SessionToken::new(token),
            name: None,
        }),
        None => AttemptOutcome::Inconclusive("token marker present but no token found".to_string()),
    }
}

fn json_error(decoded: Option<&Value>) -> Option<String> {
    decoded
        .and_then(Value::as_object)
        .and_then(|object| first_string(object, &ERROR_KEYS))
}

fn token_from_text(body: &str) -> Option<String> {
    TOKEN_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Walks the pairing chain for a code
#[derive(Debug, Clone)]
pub struct PairingNegotiator {
    client: HttpClient,
    chain: Vec<PairingEndpoint>,
}

impl PairingNegotiator {
    pub fn new(client: HttpClient, chain: Vec<PairingEndpoint>) -> Self {
        Self { client, chain }
    }

    pub fn chain(&self) -> &[PairingEndpoint] {
        &self.chain
    }

    /// Try each endpoint in order with an already normalized code
    pub async fn negotiate(&self, code: &str) -> PairingResult {
        let mut attempts = 0;

        for endpoint in &self.chain {
            attempts += 1;
            match self.attempt(endpoint, code).await {
                AttemptOutcome::Paired(screen) => {
                    info!(endpoint = %endpoint.url, attempts, "pairing succeeded");
                    return PairingResult::Paired(screen);
                }
                AttemptOutcome::Rejected(reason) => {
                    warn!(endpoint = %endpoint.url, reason = %reason, "pairing code rejected");
                    return PairingResult::Rejected {
                        reason,
                        endpoint: endpoint.url.clone(),
                    };
                }
                AttemptOutcome::Inconclusive(detail) => {
                    debug!(endpoint = %endpoint.url, detail = %detail, "pairing attempt inconclusive");
                }
            }
        }

        info!(attempts, "pairing chain exhausted");
        PairingResult::Exhausted { attempts }
    }

    async fn attempt(&self, endpoint: &PairingEndpoint, code: &str) -> AttemptOutcome {
        let started = Instant::now();
        let response = self
            .client
            .post_form(&endpoint.url, endpoint.render_body(code), endpoint.timeout)
            .await;

        match response {
            Err(e) => AttemptOutcome::Inconclusive(e.to_string()),
            Ok(response) if !response.is_success() => {
                AttemptOutcome::Inconclusive(format!("HTTP {}", response.status))
            }
            Ok(response) => {
                debug!(
                    endpoint = %endpoint.url,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "pairing endpoint replied"
                );
                interpret_body(&response.body)
            }
        }
    }
}

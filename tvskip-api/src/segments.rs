//! Skip-segment lookup
//!
//! Queries a SponsorBlock-compatible service for crowd-sourced time ranges
//! (sponsor reads, intros and so on) within a piece of content.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::client::{require_success, HttpClient};
use crate::error::{ApiError, Result};

/// Categories requested when none are configured
pub const DEFAULT_CATEGORIES: [&str; 5] = ["sponsor", "intro", "outro", "interaction", "selfpromo"];

/// A skippable time range, in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub category: String,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

#[derive(Debug, Deserialize)]
struct WireSegment {
    category: String,
    segment: [f64; 2],
}

impl From<WireSegment> for Segment {
    fn from(wire: WireSegment) -> Self {
        Segment {
            category: wire.category,
            start: wire.segment[0],
            end: wire.segment[1],
        }
    }
}

/// Source of skip segments for a content id
#[async_trait]
pub trait SegmentLookup: Send + Sync {
    /// Segments in service order; an empty list means nothing to skip
    async fn lookup(&self, content_id: &str) -> Result<Vec<Segment>>;
}

/// HTTP implementation of [`SegmentLookup`]
#[derive(Debug, Clone)]
pub struct SegmentClient {
    client: HttpClient,
    endpoint: String,
    categories: Vec<String>,
    timeout: Duration,
}

impl SegmentClient {
    /// `base_url` is normally `https://sponsor.ajay.app`
    pub fn new(client: HttpClient, base_url: &str, categories: Vec<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/skipSegments", base_url.trim_end_matches('/')),
            categories,
            timeout,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }
}

/// Decode the service's JSON array
pub fn parse_segments(body: &str) -> Result<Vec<Segment>> {
    let wire: Vec<WireSegment> = serde_json::from_str(body)?;
    Ok(wire.into_iter().map(Segment::from).collect())
}

#[async_trait]
impl SegmentLookup for SegmentClient {
    async fn lookup(&self, content_id: &str) -> Result<Vec<Segment>> {
        if content_id.is_empty() {
            return Err(ApiError::InvalidParameter("empty content id".to_string()));
        }

        let categories = serde_json::to_string(&self.categories)?;
        let response = self
            .client
            .get_with_query(
                &self.endpoint,
                &[("videoID", content_id), ("categories", categories.as_str())],
                self.timeout,
            )
            .await?;

        // The service answers 404 when no segments exist
        if response.status == 404 {
            debug!(content_id, "no skip segments");
            return Ok(Vec::new());
        }

        let response = require_success(&self.endpoint, response)?;
        let segments = parse_segments(&response.body)?;
        debug!(
            content_id,
            count = segments.len(),
            latency_ms = response.latency.as_millis() as u64,
            "skip segment lookup"
        );
        Ok(segments)
    }
}

//! Segment gate
//!
//! Turns a content id into at most one seek: look the id up, take the first
//! segment the service returns and jump to its end.

use std::sync::Arc;

use tracing::{debug, info};
use tvskip_api::{Command, Segment, SegmentLookup};
use tvskip_state::Device;

use crate::dispatcher::CommandSink;
use crate::stats::StatsSink;

#[derive(Clone)]
pub struct SegmentGate {
    lookup: Arc<dyn SegmentLookup>,
    commands: Arc<dyn CommandSink>,
    stats: Arc<dyn StatsSink>,
}

impl SegmentGate {
    pub fn new(lookup: Arc<dyn SegmentLookup>, commands: Arc<dyn CommandSink>, stats: Arc<dyn StatsSink>) -> Self {
        Self {
            lookup,
            commands,
            stats,
        }
    }

    /// Skip the first segment of newly detected content
    ///
    /// Returns the segment that was skipped. Lookup failures and empty
    /// replies take no action.
    pub async fn check(&self, device: &Device, content_id: &str) -> Option<Segment> {
        let segments = self.segments(content_id).await?;
        let first = segments.into_iter().next()?;

        self.enact(device, content_id, first)
    }

    /// Manual skip requested by the user
    ///
    /// With a known `position`, the first segment that has not ended yet is
    /// used; otherwise the first segment, as in [`check`](Self::check).
    pub async fn skip_now(&self, device: &Device, content_id: &str, position: Option<f64>) -> Option<Segment> {
        let segments = self.segments(content_id).await?;

        let chosen = match position {
            Some(position) => segments.iter().find(|s| s.end > position).cloned(),
            None => segments.first().cloned(),
        };
        let Some(segment) = chosen else {
            info!(device_id = %device.id, content_id, "no segment ahead of current position");
            return None;
        };

        self.enact(device, content_id, segment)
    }

    async fn segments(&self, content_id: &str) -> Option<Vec<Segment>> {
        match self.lookup.lookup(content_id).await {
            Ok(segments) if segments.is_empty() => {
                debug!(content_id, "no segments");
                None
            }
            Ok(segments) => Some(segments),
            Err(e) => {
                debug!(content_id, error = %e, "segment lookup failed");
                None
            }
        }
    }

    fn enact(&self, device: &Device, content_id: &str, segment: Segment) -> Option<Segment> {
        info!(
            device_id = %device.id,
            content_id,
            category = %segment.category,
            start = segment.start,
            end = segment.end,
            "skipping segment"
        );

        self.commands.send(Command::Seek(segment.end), device);
        self.stats.record_skip(segment.duration(), &segment.category);
        Some(segment)
    }
}

impl std::fmt::Debug for SegmentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rstest::rstest;
    use tvskip_api::ApiError;

    struct FixedLookup(tvskip_api::Result<Vec<Segment>>);

    #[async_trait]
    impl SegmentLookup for FixedLookup {
        async fn lookup(&self, _content_id: &str) -> tvskip_api::Result<Vec<Segment>> {
            match &self.0 {
                Ok(segments) => Ok(segments.clone()),
                Err(_) => Err(ApiError::NetworkError("unreachable".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<(Command, String)>>,
        skips: Mutex<Vec<(f64, String)>>,
    }

    impl CommandSink for Recorder {
        fn send(&self, command: Command, device: &Device) {
            self.commands.lock().push((command, device.id.clone()));
        }
    }

    impl StatsSink for Recorder {
        fn record_skip(&self, duration: f64, category: &str) {
            self.skips.lock().push((duration, category.to_string()));
        }
    }

    fn segment(category: &str, start: f64, end: f64) -> Segment {
        Segment {
            category: category.to_string(),
            start,
            end,
        }
    }

    fn gate(lookup: tvskip_api::Result<Vec<Segment>>) -> (SegmentGate, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let gate = SegmentGate::new(Arc::new(FixedLookup(lookup)), recorder.clone(), recorder.clone());
        (gate, recorder)
    }

    fn tv() -> Device {
        Device::new("tv-1", "TV", "Chromecast")
    }

    #[tokio::test]
    async fn test_single_segment_issues_one_seek() {
        let (gate, recorder) = gate(Ok(vec![segment("sponsor", 30.0, 75.0)]));

        let skipped = gate.check(&tv(), "dQw4w9WgXcQ").await;

        assert_eq!(skipped, Some(segment("sponsor", 30.0, 75.0)));
        assert_eq!(*recorder.commands.lock(), vec![(Command::Seek(75.0), "tv-1".to_string())]);
        assert_eq!(*recorder.skips.lock(), vec![(45.0, "sponsor".to_string())]);
    }

    #[tokio::test]
    async fn test_first_segment_wins_in_service_order() {
        let (gate, recorder) = gate(Ok(vec![segment("intro", 100.0, 110.0), segment("sponsor", 5.0, 20.0)]));

        gate.check(&tv(), "dQw4w9WgXcQ").await;

        assert_eq!(recorder.commands.lock().len(), 1);
        assert_eq!(recorder.commands.lock()[0].0, Command::Seek(110.0));
    }

    #[rstest]
    #[case(Ok(vec![]))]
    #[case(Err(ApiError::NetworkError("down".to_string())))]
    #[tokio::test]
    async fn test_no_action(#[case] lookup: tvskip_api::Result<Vec<Segment>>) {
        let (gate, recorder) = gate(lookup);

        assert!(gate.check(&tv(), "dQw4w9WgXcQ").await.is_none());
        assert!(recorder.commands.lock().is_empty());
        assert!(recorder.skips.lock().is_empty());
    }

    #[tokio::test]
    async fn test_skip_now_picks_segment_ahead_of_position() {
        let (gate, recorder) = gate(Ok(vec![segment("intro", 0.0, 10.0), segment("sponsor", 60.0, 90.0)]));

        let skipped = gate.skip_now(&tv(), "dQw4w9WgXcQ", Some(65.0)).await;

        assert_eq!(skipped.map(|s| s.category), Some("sponsor".to_string()));
        assert_eq!(recorder.commands.lock()[0].0, Command::Seek(90.0));
    }

    #[tokio::test]
    async fn test_skip_now_past_every_segment() {
        let (gate, recorder) = gate(Ok(vec![segment("intro", 0.0, 10.0)]));

        assert!(gate.skip_now(&tv(), "dQw4w9WgXcQ", Some(300.0)).await.is_none());
        assert!(recorder.commands.lock().is_empty());
    }
}

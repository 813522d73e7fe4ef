//! Skip statistics seam

use tracing::info;

/// Receives a notification after every enacted skip
///
/// Implementations must not block; persistence belongs to the host
/// application.
pub trait StatsSink: Send + Sync {
    /// `duration` is the skipped span in seconds
    fn record_skip(&self, duration: f64, category: &str);
}

/// Default sink that only emits a tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStats;

impl StatsSink for TracingStats {
    fn record_skip(&self, duration: f64, category: &str) {
        info!(duration_secs = duration, category, "segment skipped");
    }
}

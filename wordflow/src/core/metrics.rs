//! Per-stage atomic counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by every stage.
#[derive(Debug, Default)]
pub struct StageMetrics {
    /// Items accepted into the inbound queue.
    accepted: AtomicU64,
    /// Items whose transformation finished.
    processed: AtomicU64,
    /// Outputs pushed to the outbound queue.
    emitted: AtomicU64,
    /// Accept calls that had to wait for a free slot.
    blocked_accepts: AtomicU64,
    /// Accepted items abandoned because of a fault, failed ones included.
    discarded: AtomicU64,
    /// Outputs produced but not taken by a downstream stage.
    dropped_outputs: AtomicU64,
}

impl StageMetrics {
    /// Records an accepted item.
    pub fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a processed item.
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` emitted outputs.
    pub fn record_emitted(&self, count: u64) {
        self.emitted.fetch_add(count, Ordering::Relaxed);
    }

    /// Records an accept that found the stage full.
    pub fn record_blocked(&self) {
        self.blocked_accepts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a discarded item.
    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an output that could not be forwarded.
    pub fn record_dropped_output(&self) {
        self.dropped_outputs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of accepted items.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Returns the number of processed items.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Returns the number of emitted outputs.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Returns the number of accepts that waited for capacity.
    #[must_use]
    pub fn blocked_accepts(&self) -> u64 {
        self.blocked_accepts.load(Ordering::Relaxed)
    }

    /// Returns the number of discarded items.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Returns the number of outputs that were not forwarded.
    #[must_use]
    pub fn dropped_outputs(&self) -> u64 {
        self.dropped_outputs.load(Ordering::Relaxed)
    }

    /// Accepted items not yet accounted for as processed or discarded.
    ///
    /// Zero once the stage is terminal.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.accepted()
            .saturating_sub(self.processed() + self.discarded())
    }

    /// Takes a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted(),
            processed: self.processed(),
            emitted: self.emitted(),
            blocked_accepts: self.blocked_accepts(),
            discarded: self.discarded(),
            dropped_outputs: self.dropped_outputs(),
        }
    }
}

/// A serialisable copy of [`StageMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Items accepted.
    pub accepted: u64,
    /// Items processed.
    pub processed: u64,
    /// Outputs emitted.
    pub emitted: u64,
    /// Accepts that waited for capacity.
    pub blocked_accepts: u64,
    /// Items discarded.
    pub discarded: u64,
    /// Outputs not forwarded.
    #[serde(default)]
    pub dropped_outputs: u64,
}

impl MetricsSnapshot {
    /// Converts metrics to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "accepted": self.accepted,
            "processed": self.processed,
            "emitted": self.emitted,
            "blocked_accepts": self.blocked_accepts,
            "discarded": self.discarded,
            "dropped_outputs": self.dropped_outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_default() {
        let metrics = StageMetrics::default();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = StageMetrics::default();

        metrics.record_accept();
        metrics.record_accept();
        metrics.record_processed();
        metrics.record_emitted(3);
        metrics.record_blocked();
        metrics.record_discard();
        metrics.record_dropped_output();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.emitted, 3);
        assert_eq!(snapshot.blocked_accepts, 1);
        assert_eq!(snapshot.discarded, 1);
        assert_eq!(snapshot.dropped_outputs, 1);
        assert_eq!(metrics.in_flight(), 0);
    }

    #[test]
    fn test_snapshot_to_dict() {
        let metrics = StageMetrics::default();
        metrics.record_emitted(2);

        let dict = metrics.snapshot().to_dict();
        assert_eq!(dict["emitted"], 2);
        assert_eq!(dict["accepted"], 0);
    }
}

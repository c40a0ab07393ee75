//! Statistics snapshots for broadcasters and render sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Broadcaster-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Number of writes
    pub writes: u64,
    /// Total bytes written
    pub bytes_written: u64,
    /// Notifications handed to a subscriber channel
    pub notifications_sent: u64,
    /// Notifications dropped because a subscriber channel was full
    pub notifications_dropped: u64,
    /// Currently registered subscribers
    pub subscribers: usize,
}

impl BroadcastStats {
    /// Fraction of notifications that were dropped
    pub fn drop_ratio(&self) -> f64 {
        let total = self.notifications_sent + self.notifications_dropped;
        if total > 0 {
            self.notifications_dropped as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Render-session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events received from the subscriber channel
    pub events_received: u64,
    /// Events pushed onto the bounded queue
    pub events_enqueued: u64,
    /// Events dropped because the queue was full
    pub events_dropped: u64,
    /// Events popped by the driver
    pub events_dequeued: u64,
    /// Events delivered completely to the device
    pub events_rendered: u64,
    /// Bytes copied into device buffers
    pub bytes_rendered: u64,
    /// Device buffers acquired and released
    pub chunks_rendered: u64,
    /// Polling waits for device space
    pub device_waits: u64,
    /// Failed buffer acquisitions that were retried
    pub acquire_retries: u64,
}

impl PipelineStats {
    /// Audio duration delivered, given the stream byte rate
    pub fn rendered_duration(&self, byte_rate: u64) -> Duration {
        if byte_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.bytes_rendered as f64 / byte_rate as f64)
    }

    /// Events currently sitting in the queue
    pub fn queued(&self) -> u64 {
        self.events_enqueued.saturating_sub(self.events_dequeued)
    }
}

/// Live counters behind [`BroadcastStats`]
#[derive(Debug, Default)]
pub(crate) struct BroadcastCounters {
    pub writes: AtomicU64,
    pub bytes_written: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notifications_dropped: AtomicU64,
}

impl BroadcastCounters {
    pub fn snapshot(&self, subscribers: usize) -> BroadcastStats {
        BroadcastStats {
            writes: self.writes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            subscribers,
        }
    }
}

/// Live counters behind [`PipelineStats`], shared by both render stages
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub(crate) events_received: AtomicU64,
    pub(crate) events_enqueued: AtomicU64,
    pub(crate) events_dropped: AtomicU64,
    pub(crate) events_dequeued: AtomicU64,
    pub(crate) events_rendered: AtomicU64,
    pub(crate) bytes_rendered: AtomicU64,
    pub(crate) chunks_rendered: AtomicU64,
    pub(crate) device_waits: AtomicU64,
    pub(crate) acquire_retries: AtomicU64,
}

impl PipelineCounters {
    /// Take a consistent-enough snapshot of every counter
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_dequeued: self.events_dequeued.load(Ordering::Relaxed),
            events_rendered: self.events_rendered.load(Ordering::Relaxed),
            bytes_rendered: self.bytes_rendered.load(Ordering::Relaxed),
            chunks_rendered: self.chunks_rendered.load(Ordering::Relaxed),
            device_waits: self.device_waits.load(Ordering::Relaxed),
            acquire_retries: self.acquire_retries.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_stats_default() {
        let stats = BroadcastStats::default();
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.notifications_dropped, 0);
        assert_eq!(stats.drop_ratio(), 0.0);
    }

    #[test]
    fn test_drop_ratio() {
        let stats = BroadcastStats {
            notifications_sent: 3,
            notifications_dropped: 1,
            ..Default::default()
        };
        assert_eq!(stats.drop_ratio(), 0.25);
    }

    #[test]
    fn test_rendered_duration() {
        let stats = PipelineStats {
            bytes_rendered: 384_000,
            ..Default::default()
        };
        // 48kHz stereo f32
        assert_eq!(stats.rendered_duration(384_000), Duration::from_secs(1));
        assert_eq!(stats.rendered_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = PipelineCounters::default();
        PipelineCounters::incr(&counters.events_received);
        PipelineCounters::incr(&counters.events_enqueued);
        PipelineCounters::add(&counters.bytes_rendered, 512);

        let stats = counters.snapshot();
        assert_eq!(stats.events_received, 1);
        assert_eq!(stats.queued(), 1);
        assert_eq!(stats.bytes_rendered, 512);
    }

    #[test]
    fn test_broadcast_counters_snapshot() {
        let counters = BroadcastCounters::default();
        counters.writes.fetch_add(2, Ordering::Relaxed);
        counters.notifications_dropped.fetch_add(1, Ordering::Relaxed);

        let stats = counters.snapshot(3);
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.notifications_dropped, 1);
        assert_eq!(stats.subscribers, 3);
    }
}

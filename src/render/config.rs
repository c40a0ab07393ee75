//! Render session configuration

use std::time::Duration;

/// Default bounded queue capacity between collector and driver
pub const DEFAULT_QUEUE_CAPACITY: usize = 200;

/// Floor for the device-space polling interval
pub const DEFAULT_MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Render session configuration options
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Capacity of the event queue; events beyond it are dropped
    pub queue_capacity: usize,

    /// Fixed wait between device-space polls (None = half the device period)
    pub poll_interval: Option<Duration>,

    /// Lower bound for the polling wait
    pub min_poll_interval: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: None,
            min_poll_interval: DEFAULT_MIN_POLL_INTERVAL,
        }
    }
}

impl RenderConfig {
    /// Set the queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Use a fixed polling interval instead of deriving it from the device
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the polling interval floor
    pub fn min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    /// Polling interval for a device with the given period
    pub fn effective_poll_interval(&self, device_period: Duration) -> Duration {
        self.poll_interval
            .unwrap_or(device_period / 2)
            .max(self.min_poll_interval)
    }
}

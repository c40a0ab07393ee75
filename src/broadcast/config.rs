//! Broadcaster configuration

/// Default per-subscriber channel capacity
///
/// One slot means at most one pending notification per subscriber; anything
/// that arrives while the slot is occupied is dropped.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1;

/// Broadcaster configuration options
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Capacity of each subscriber channel
    pub subscriber_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl BroadcastConfig {
    /// Set the subscriber channel capacity (at least 1)
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }
}

//! Collector stage
//!
//! Moves events from a subscriber channel onto the session's bounded queue.
//! The push never waits: when the queue is full the event is dropped and
//! counted. When the collector exits it drops its queue sender, which closes
//! the queue so the driver can drain what is left and stop.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::broadcast::{Subscriber, Subscription};
use crate::stats::PipelineCounters;

use super::state::Termination;

/// Sending half of the event queue
pub type QueueSender = mpsc::Sender<Subscription>;

/// Receiving half of the event queue
pub type QueueReceiver = mpsc::Receiver<Subscription>;

/// Create a bounded FIFO event queue
pub fn event_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    mpsc::channel(capacity.max(1))
}

/// First render stage: subscriber channel → bounded queue
#[derive(Debug)]
pub struct Collector {
    subscriber: Subscriber,
    queue: QueueSender,
    counters: Arc<PipelineCounters>,
}

impl Collector {
    /// Create a collector feeding `queue`
    pub fn new(subscriber: Subscriber, queue: QueueSender, counters: Arc<PipelineCounters>) -> Self {
        Self {
            subscriber,
            queue,
            counters,
        }
    }

    /// Run until the subscriber channel closes or `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) -> Termination {
        let subscriber = self.subscriber.id();

        let termination = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Termination::Cancelled,
                event = self.subscriber.recv() => event,
            };

            let Some(event) = event else {
                break Termination::Closed;
            };
            PipelineCounters::incr(&self.counters.events_received);

            match self.queue.try_send(event) {
                Ok(()) => {
                    PipelineCounters::incr(&self.counters.events_enqueued);
                }
                Err(TrySendError::Full(event)) => {
                    PipelineCounters::incr(&self.counters.events_dropped);
                    tracing::warn!(
                        subscriber = %subscriber,
                        position = %event.position,
                        "Queue full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    // Driver is gone, nothing left to feed
                    break Termination::Closed;
                }
            }
        };

        tracing::debug!(
            subscriber = %subscriber,
            termination = ?termination,
            "Collector stopped"
        );
        termination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{BroadcastConfig, Broadcaster};
    use crate::stream::Position;

    #[tokio::test]
    async fn test_forwards_in_order_and_closes_queue() {
        let mux = Broadcaster::with_config(BroadcastConfig::default().subscriber_capacity(8));
        let counters = Arc::new(PipelineCounters::default());
        let (tx, mut rx) = event_queue(8);
        let collector = Collector::new(mux.add_subscriber(), tx, Arc::clone(&counters));

        mux.write(&[0u8; 10]).unwrap();
        mux.write(&[0u8; 20]).unwrap();
        mux.close();

        let termination = collector.run(CancellationToken::new()).await;
        assert_eq!(termination, Termination::Closed);

        assert_eq!(rx.recv().await.unwrap().position, Position::new(0, 10));
        assert_eq!(rx.recv().await.unwrap().position, Position::new(10, 30));
        // Queue closed once drained
        assert!(rx.recv().await.is_none());

        let stats = counters.snapshot();
        assert_eq!(stats.events_received, 2);
        assert_eq!(stats.events_enqueued, 2);
        assert_eq!(stats.events_dropped, 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_excess() {
        let mux = Broadcaster::with_config(BroadcastConfig::default().subscriber_capacity(32));
        let counters = Arc::new(PipelineCounters::default());
        let (tx, mut rx) = event_queue(3);
        let collector = Collector::new(mux.add_subscriber(), tx, Arc::clone(&counters));

        for _ in 0..10 {
            mux.write(&[1u8; 4]).unwrap();
        }
        mux.close();
        collector.run(CancellationToken::new()).await;

        let stats = counters.snapshot();
        assert_eq!(stats.events_received, 10);
        assert_eq!(stats.events_enqueued, 3);
        assert_eq!(stats.events_dropped, 7);

        // The survivors are the oldest, in order
        let mut froms = Vec::new();
        while let Some(event) = rx.recv().await {
            froms.push(event.position.from);
        }
        assert_eq!(froms, vec![0, 4, 8]);
    }

    #[tokio::test]
    async fn test_cancel_stops_collector() {
        let mux = Broadcaster::new();
        let counters = Arc::new(PipelineCounters::default());
        let (tx, mut rx) = event_queue(4);
        let collector = Collector::new(mux.add_subscriber(), tx, counters);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(collector.run(cancel.clone()));
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), Termination::Cancelled);
        assert!(rx.recv().await.is_none());
    }
}

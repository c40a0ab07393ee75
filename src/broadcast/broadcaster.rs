//! Broadcaster implementation
//!
//! Turns every write into a non-blocking multicast of the written range to
//! all registered subscribers.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{Error, Result};
use crate::stats::{BroadcastCounters, BroadcastStats};
use crate::stream::{Position, Stream, WaveFormat};

use super::config::BroadcastConfig;
use super::subscription::{Subscriber, SubscriberId, Subscription};

/// Subscriber set guarded by the broadcaster lock
#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    channels: Vec<(SubscriberId, mpsc::Sender<Subscription>)>,
    closed: bool,
}

/// Fan-out of stream writes to independently paced subscribers
///
/// Writes, broadcasts and subscriber-set changes are serialized by one mutex.
/// Delivery uses `try_send` only: a subscriber whose channel is full misses
/// that notification. This keeps the producer, which runs on the capture
/// path, independent of how fast any consumer drains its channel.
#[derive(Debug)]
pub struct Broadcaster {
    stream: Arc<Stream>,
    subscribers: Mutex<Subscribers>,
    config: BroadcastConfig,
    counters: BroadcastCounters,
}

impl Broadcaster {
    /// Create a broadcaster over a fresh stream with default configuration
    pub fn new() -> Self {
        Self::with_config(BroadcastConfig::default())
    }

    /// Create a broadcaster over a fresh stream with custom configuration
    pub fn with_config(config: BroadcastConfig) -> Self {
        Self::with_stream(Arc::new(Stream::new()), config)
    }

    /// Create a broadcaster bound to an existing stream
    pub fn with_stream(stream: Arc<Stream>, config: BroadcastConfig) -> Self {
        Self {
            stream,
            subscribers: Mutex::new(Subscribers::default()),
            config,
            counters: BroadcastCounters::default(),
        }
    }

    /// Get the broadcaster configuration
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// The stream this broadcaster writes to
    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    /// Register a new subscriber
    ///
    /// After [`close`](Self::close) the returned subscriber's channel is
    /// already closed.
    pub fn add_subscriber(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);
        let mut subs = self.subscribers.lock();

        let id = SubscriberId(subs.next_id);
        subs.next_id += 1;

        if subs.closed {
            tracing::debug!(subscriber = %id, "Subscriber added after close");
            return Subscriber::new(id, rx);
        }

        subs.channels.push((id, tx));
        tracing::info!(
            subscriber = %id,
            subscribers = subs.channels.len(),
            "Subscriber added"
        );

        Subscriber::new(id, rx)
    }

    /// Remove a subscriber and close its channel
    ///
    /// Unknown or already removed ids are ignored.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        let mut subs = self.subscribers.lock();
        let before = subs.channels.len();
        // Dropping the sender closes the channel
        subs.channels.retain(|(sub_id, _)| *sub_id != id);

        if subs.channels.len() != before {
            tracing::debug!(
                subscriber = %id,
                subscribers = subs.channels.len(),
                "Subscriber removed"
            );
        }
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().channels.len()
    }

    /// Publish the stream format
    pub fn set_format(&self, format: WaveFormat) -> Result<()> {
        self.stream.set_format(format)
    }

    /// Append `data` to the stream and notify every subscriber
    ///
    /// Fails with [`Error::ChannelClosed`] once the broadcaster is closed.
    pub fn write(&self, data: &[u8]) -> Result<Position> {
        let mut subs = self.subscribers.lock();
        if subs.closed {
            return Err(Error::ChannelClosed);
        }

        let pos = self.stream.write(data)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        self.broadcast_locked(&mut subs, pos);
        Ok(pos)
    }

    /// Notify every subscriber of `pos` without writing
    pub fn broadcast(&self, pos: Position) {
        let mut subs = self.subscribers.lock();
        if !subs.closed {
            self.broadcast_locked(&mut subs, pos);
        }
    }

    fn broadcast_locked(&self, subs: &mut Subscribers, pos: Position) {
        let event = Subscription::new(Arc::clone(&self.stream), pos);
        let mut sent = 0u64;
        let mut dropped = 0u64;

        subs.channels.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => {
                sent += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                tracing::trace!(subscriber = %id, position = %pos, "Subscriber full, notification dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = %id, "Subscriber gone, pruning");
                false
            }
        });

        self.counters
            .notifications_sent
            .fetch_add(sent, Ordering::Relaxed);
        self.counters
            .notifications_dropped
            .fetch_add(dropped, Ordering::Relaxed);
    }

    /// Copy out the bytes of `pos` from the underlying stream
    pub fn read(&self, pos: Position) -> Result<Bytes> {
        self.stream.read(pos)
    }

    /// Close the stream and every subscriber channel
    ///
    /// Idempotent and safe to call concurrently.
    pub fn close(&self) {
        let mut subs = self.subscribers.lock();
        if subs.closed {
            return;
        }
        // Under the lock so no write can land after done fires
        subs.closed = true;
        self.stream.close();
        let count = subs.channels.len();
        subs.channels.clear();

        tracing::info!(
            subscribers = count,
            bytes = self.stream.len(),
            "Broadcaster closed"
        );
    }

    /// Check if the broadcaster was closed
    pub fn is_closed(&self) -> bool {
        self.subscribers.lock().closed
    }

    /// Get broadcaster statistics
    pub fn stats(&self) -> BroadcastStats {
        let subscribers = self.subscriber_count();
        self.counters.snapshot(subscribers)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use tokio_util::sync::CancellationToken;

    use super::*;

    #[tokio::test]
    async fn test_add_subscriber_receives_writes() {
        let mux = Broadcaster::with_config(BroadcastConfig::default().subscriber_capacity(4));
        let mut sub = mux.add_subscriber();

        mux.write(&[1u8; 100]).unwrap();
        mux.write(&[2u8; 150]).unwrap();

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(first.position, Position::new(0, 100));
        assert_eq!(second.position, Position::new(100, 250));
        assert_eq!(second.bytes().unwrap().as_ref(), &[2u8; 150][..]);
    }

    #[tokio::test]
    async fn test_full_subscriber_drops_without_blocking() {
        let mux = Broadcaster::new();
        let mut slow = mux.add_subscriber();

        let start = Instant::now();
        for _ in 0..1000 {
            mux.write(&[0u8; 16]).unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        // Only the first notification fit in the single slot
        let event = slow.try_recv().unwrap();
        assert_eq!(event.position, Position::new(0, 16));
        assert!(slow.try_recv().is_none());

        let stats = mux.stats();
        assert_eq!(stats.writes, 1000);
        assert_eq!(stats.notifications_sent, 1);
        assert_eq!(stats.notifications_dropped, 999);
        // Stream still holds everything
        assert_eq!(mux.read(Position::new(0, 16_000)).unwrap().len(), 16_000);
    }

    #[tokio::test]
    async fn test_subscribers_paced_independently() {
        let mux = Broadcaster::with_config(BroadcastConfig::default().subscriber_capacity(2));
        let mut fast = mux.add_subscriber();
        let mut slow = mux.add_subscriber();

        mux.write(b"a").unwrap();
        assert!(fast.try_recv().is_some());
        mux.write(b"b").unwrap();
        assert!(fast.try_recv().is_some());
        mux.write(b"c").unwrap();
        assert!(fast.try_recv().is_some());

        // Slow subscriber kept the first two, in write order
        assert_eq!(slow.try_recv().unwrap().position, Position::new(0, 1));
        assert_eq!(slow.try_recv().unwrap().position, Position::new(1, 2));
        assert!(slow.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_remove_subscriber_closes_channel() {
        let mux = Broadcaster::new();
        let mut sub = mux.add_subscriber();
        let id = sub.id();

        mux.remove_subscriber(id);
        assert_eq!(mux.subscriber_count(), 0);
        assert!(sub.recv().await.is_none());

        // Second removal is a no-op
        mux.remove_subscriber(id);
        assert_eq!(mux.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mux = Broadcaster::new();
        let mut a = mux.add_subscriber();
        let mut b = mux.add_subscriber();

        mux.close();
        mux.close();

        assert!(mux.is_closed());
        assert!(mux.stream().is_closed());
        assert_eq!(mux.subscriber_count(), 0);
        assert!(a.recv().await.is_none());
        assert!(b.recv().await.is_none());

        // Removing after close is harmless
        mux.remove_subscriber(a.id());
    }

    #[tokio::test]
    async fn test_concurrent_close() {
        let mux = Arc::new(Broadcaster::new());
        let mut sub = mux.add_subscriber();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mux = Arc::clone(&mux);
                std::thread::spawn(move || mux.close())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(sub.recv().await.is_none());
        assert!(mux.is_closed());
    }

    #[tokio::test]
    async fn test_write_after_close() {
        let mux = Broadcaster::new();
        mux.write(&[1, 2, 3]).unwrap();
        mux.close();

        assert!(matches!(mux.write(&[4]), Err(Error::ChannelClosed)));
        assert_eq!(mux.read(Position::new(0, 3)).unwrap().as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_no_write_lands_after_done() {
        let mux = Arc::new(Broadcaster::new());

        let producer = {
            let mux = Arc::clone(&mux);
            std::thread::spawn(move || {
                while mux.write(&[7u8; 16]).is_ok() {}
            })
        };
        let closer = {
            let mux = Arc::clone(&mux);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                mux.close();
            })
        };

        mux.stream().wait_done(&CancellationToken::new()).await.unwrap();
        let len_at_done = mux.stream().len();

        closer.join().unwrap();
        producer.join().unwrap();
        assert_eq!(mux.stream().len(), len_at_done);
        assert_eq!(mux.stats().bytes_written, len_at_done as u64);
    }

    #[tokio::test]
    async fn test_add_subscriber_after_close() {
        let mux = Broadcaster::new();
        mux.close();

        let mut sub = mux.add_subscriber();
        assert!(sub.recv().await.is_none());
        assert_eq!(mux.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_receiver_pruned() {
        let mux = Broadcaster::new();
        let sub = mux.add_subscriber();
        let _keep = mux.add_subscriber();
        drop(sub);

        mux.write(&[0u8; 4]).unwrap();
        assert_eq!(mux.subscriber_count(), 1);
    }

    #[test]
    fn test_write_from_producer_thread() {
        let mux = Arc::new(Broadcaster::with_config(
            BroadcastConfig::default().subscriber_capacity(64),
        ));
        let mut sub = mux.add_subscriber();

        let producer = {
            let mux = Arc::clone(&mux);
            std::thread::spawn(move || {
                for i in 0..32u8 {
                    mux.write(&[i; 8]).unwrap();
                }
                mux.close();
            })
        };
        producer.join().unwrap();

        let mut expected_from = 0;
        while let Some(event) = sub.try_recv() {
            assert_eq!(event.position.from, expected_from);
            expected_from = event.position.to;
        }
        assert_eq!(expected_from, 256);
    }
}

//! Notification events and subscriber handles

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::stream::{Position, Stream};

/// Identifier of a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub(super) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// "New data written" event delivered to a subscriber
///
/// Cheap to clone: the stream is shared, the position is two integers.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Stream the bytes were written to
    pub stream: Arc<Stream>,
    /// Range covered by the triggering write
    pub position: Position,
}

impl Subscription {
    /// Create a new event
    pub fn new(stream: Arc<Stream>, position: Position) -> Self {
        Self { stream, position }
    }

    /// Copy out the bytes this event refers to
    pub fn bytes(&self) -> Result<Bytes> {
        self.stream.read(self.position)
    }

    /// Number of bytes covered by the event
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// Check if the event covers no bytes
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }
}

/// Receive side of a subscriber channel
///
/// Returned by [`Broadcaster::add_subscriber`](super::Broadcaster::add_subscriber).
/// The channel ends when the subscriber is removed or the broadcaster is
/// closed.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    rx: mpsc::Receiver<Subscription>,
}

impl Subscriber {
    pub(super) fn new(id: SubscriberId, rx: mpsc::Receiver<Subscription>) -> Self {
        Self { id, rx }
    }

    /// Subscriber identifier, used for removal
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event; `None` once the channel is closed and empty
    pub async fn recv(&mut self) -> Option<Subscription> {
        self.rx.recv().await
    }

    /// Take the next event if one is pending
    pub fn try_recv(&mut self) -> Option<Subscription> {
        self.rx.try_recv().ok()
    }
}

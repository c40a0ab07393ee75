//! Shared PCM stream
//!
//! One producer appends, any number of readers copy out ranges they were
//! notified about. Writes take the write side of a reader/writer lock so a
//! read never observes a partially appended region.

use bytes::Bytes;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

use super::buffer::StreamBuffer;
use super::format::WaveFormat;
use super::position::Position;
use super::signal::Signal;

/// Growable, concurrently readable PCM byte stream
#[derive(Debug, Default)]
pub struct Stream {
    buffer: RwLock<StreamBuffer>,
    format: RwLock<Option<WaveFormat>>,
    ready: Signal,
    done: Signal,
}

impl Stream {
    /// Create an empty stream with no format
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data`, returning the range it occupies
    pub fn write(&self, data: &[u8]) -> Result<Position> {
        self.buffer.write().write(data)
    }

    /// Copy out the bytes of `pos`
    ///
    /// Callers must only ask for ranges that have been written; anything
    /// past the current length fails with [`Error::OutOfRange`].
    pub fn read(&self, pos: Position) -> Result<Bytes> {
        let buffer = self.buffer.read();
        buffer.slice(pos).map(Bytes::copy_from_slice)
    }

    /// Run `f` over the bytes of `pos` without copying them out
    pub fn read_with<R>(&self, pos: Position, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let buffer = self.buffer.read();
        buffer.slice(pos).map(f)
    }

    /// Current length in bytes
    pub fn len(&self) -> usize {
        self.buffer.read().len()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buffer.read().is_empty()
    }

    /// Allocated capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.read().capacity()
    }

    /// Drop all content while keeping the allocation
    ///
    /// Positions handed out before the reset become invalid. Ready and done
    /// keep their state.
    pub fn reset(&self) {
        self.buffer.write().clear();
        tracing::debug!("Stream content reset");
    }

    /// Publish the stream format and fire the ready signal
    ///
    /// The format can be set once; later calls fail with
    /// [`Error::FormatAlreadySet`] and leave the first format in place.
    pub fn set_format(&self, format: WaveFormat) -> Result<()> {
        {
            let mut slot = self.format.write();
            if slot.is_some() {
                return Err(Error::FormatAlreadySet);
            }
            *slot = Some(format);
        }
        self.ready.fire();

        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            bits = format.bits_per_sample,
            block_align = format.block_align,
            "Stream format set"
        );
        Ok(())
    }

    /// Stream format, once published
    pub fn format(&self) -> Option<WaveFormat> {
        *self.format.read()
    }

    /// Mark the stream finished
    ///
    /// Idempotent; bytes already written stay readable.
    pub fn close(&self) {
        if self.done.fire() {
            tracing::debug!(len = self.len(), "Stream closed");
        }
    }

    /// Check if the stream was closed
    pub fn is_closed(&self) -> bool {
        self.done.is_set()
    }

    /// Signal fired when the format is set
    pub fn ready(&self) -> &Signal {
        &self.ready
    }

    /// Signal fired when the stream is closed
    pub fn done(&self) -> &Signal {
        &self.done
    }

    /// Wait for the format, giving up when `cancel` fires
    ///
    /// Fails with [`Error::ChannelClosed`] if the stream is closed before a
    /// format was published.
    pub async fn wait_ready(&self, cancel: &CancellationToken) -> Result<WaveFormat> {
        tokio::select! {
            biased;
            result = self.ready.wait_or_cancel(cancel) => result?,
            _ = self.done.wait() => {}
        }
        self.format().ok_or(Error::ChannelClosed)
    }

    /// Wait for the producer to finish, giving up when `cancel` fires
    pub async fn wait_done(&self, cancel: &CancellationToken) -> Result<()> {
        self.done.wait_or_cancel(cancel).await
    }
}

//! Driver stage
//!
//! Pops events from the bounded queue and paces their bytes into the
//! device buffer. For each event it repeatedly asks the device how much
//! space is free, waits one polling interval when there is none, and
//! otherwise copies as much as fits.
//!
//! Cancellation is checked before every pop, at the head of every chunk
//! and during every wait. A chunk that has been acquired is always copied
//! and released before the check runs again.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::broadcast::Subscription;
use crate::error::{Error, Result};
use crate::stats::PipelineCounters;

use super::collector::QueueReceiver;
use super::device::{copy_window, Device, DeviceOp};
use super::state::{SessionState, Termination};

/// Outcome of delivering one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Complete,
    Interrupted,
}

/// Second render stage: bounded queue → device buffer
pub struct Driver<'a, D: Device> {
    device: &'a mut D,
    queue: QueueReceiver,
    counters: Arc<PipelineCounters>,
    state: Arc<SessionState>,
    poll_interval: Duration,
}

impl<'a, D: Device> Driver<'a, D> {
    /// Create a driver delivering to `device`
    pub fn new(
        device: &'a mut D,
        queue: QueueReceiver,
        counters: Arc<PipelineCounters>,
        state: Arc<SessionState>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            device,
            queue,
            counters,
            state,
            poll_interval,
        }
    }

    /// Run until the queue is closed and drained, `cancel` fires, or a
    /// fatal error occurs
    ///
    /// Fatal errors are out-of-range reads, failed buffer releases and device
    /// formats with zero-byte frames.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<Termination> {
        let buffer_frames = self
            .device
            .buffer_size_frames()
            .map_err(|e| Error::device(DeviceOp::BufferSize, e))?;

        let format = self.device.format();
        if format.block_align == 0 {
            tracing::error!(
                channels = format.channels,
                bits = format.bits_per_sample,
                "Device reports zero-byte frames"
            );
            return Err(Error::UnsupportedFormat(format!(
                "device block align 0 ({} channels, {} bits)",
                format.channels, format.bits_per_sample
            )));
        }

        loop {
            if cancel.is_cancelled() {
                self.state.drain();
                return Ok(Termination::Cancelled);
            }

            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.state.drain();
                    return Ok(Termination::Cancelled);
                }
                event = self.queue.recv() => event,
            };

            let Some(event) = event else {
                tracing::debug!("Queue closed, driver exiting");
                return Ok(Termination::Closed);
            };
            PipelineCounters::incr(&self.counters.events_dequeued);

            if event.stream.is_closed() && self.state.drain() {
                tracing::debug!("Stream closed, draining queued events");
            }

            match self.render_event(&event, buffer_frames, cancel).await? {
                Delivery::Complete => {
                    PipelineCounters::incr(&self.counters.events_rendered);
                }
                Delivery::Interrupted => {
                    self.state.drain();
                    return Ok(Termination::Cancelled);
                }
            }
        }
    }

    async fn render_event(
        &mut self,
        event: &Subscription,
        buffer_frames: u32,
        cancel: &CancellationToken,
    ) -> Result<Delivery> {
        if event.is_empty() {
            return Ok(Delivery::Complete);
        }

        let data = event.bytes()?;
        let format = self.device.format();
        let mut offset = 0;

        tracing::trace!(position = %event.position, "Rendering event");

        while offset < data.len() {
            if cancel.is_cancelled() {
                return Ok(Delivery::Interrupted);
            }

            let padding = match self.device.current_padding_frames() {
                Ok(padding) => padding,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get current padding");
                    if !self.wait(cancel).await {
                        return Ok(Delivery::Interrupted);
                    }
                    continue;
                }
            };

            let available = buffer_frames.saturating_sub(padding);
            if available == 0 {
                PipelineCounters::incr(&self.counters.device_waits);
                if !self.wait(cancel).await {
                    return Ok(Delivery::Interrupted);
                }
                continue;
            }

            let remaining = data.len() - offset;
            let frames = available.min(format.bytes_to_frames(remaining));
            let chunk = remaining.min(format.frames_to_bytes(frames));
            if chunk == 0 {
                // Nothing would ever advance the offset
                return Err(Error::UnsupportedFormat(format!(
                    "device accepts no bytes for {} frames",
                    frames
                )));
            }

            let acquired = match self.device.acquire_buffer(frames) {
                Ok(buf) => {
                    copy_window(buf, &data, offset, chunk)?;
                    // Pad a trailing partial frame with silence
                    buf[chunk..].fill(0);
                    Ok(())
                }
                Err(e) => Err(e),
            };

            if let Err(e) = acquired {
                PipelineCounters::incr(&self.counters.acquire_retries);
                tracing::warn!(frames = frames, error = %e, "Failed to get render buffer");
                if !self.wait(cancel).await {
                    return Ok(Delivery::Interrupted);
                }
                continue;
            }

            if let Err(e) = self.device.release_buffer(frames) {
                tracing::error!(frames = frames, error = %e, "Failed to release buffer");
                return Err(Error::device(DeviceOp::Release, e));
            }

            offset += chunk;
            PipelineCounters::incr(&self.counters.chunks_rendered);
            PipelineCounters::add(&self.counters.bytes_rendered, chunk as u64);
        }

        Ok(Delivery::Complete)
    }

    /// Sleep one polling interval; false if cancelled meanwhile
    async fn wait(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
    }
}

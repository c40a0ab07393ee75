//! Render device abstraction
//!
//! The render driver only needs a handful of calls from an output device:
//! its buffer size, how much of that buffer is still queued (padding), and a
//! way to borrow a slice of free space and hand it back.
//!
//! [`VirtualDevice`] is a software endpoint that drains at the device sample
//! rate and records everything it was given.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::stream::{Position, WaveFormat};

/// Error reported by a device call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// No space available or device not ready; try again later
    #[error("device busy")]
    Busy,
    /// Call failed
    #[error("{0}")]
    Failed(String),
}

/// Device call that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOp {
    /// Start
    Start,
    /// Stop
    Stop,
    /// Buffer size query
    BufferSize,
    /// Padding query
    Padding,
    /// Buffer acquisition
    Acquire,
    /// Buffer release
    Release,
}

impl std::fmt::Display for DeviceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceOp::Start => "start",
            DeviceOp::Stop => "stop",
            DeviceOp::BufferSize => "buffer size",
            DeviceOp::Padding => "padding",
            DeviceOp::Acquire => "acquire",
            DeviceOp::Release => "release",
        };
        f.write_str(name)
    }
}

/// Output device driven by a render session
///
/// Frame counts are in device frames of [`format`](Device::format).
pub trait Device {
    /// Negotiated device format
    fn format(&self) -> WaveFormat;

    /// Device period; the driver derives its polling interval from it
    fn period(&self) -> Duration;

    /// Start playback
    fn start(&mut self) -> std::result::Result<(), DeviceError>;

    /// Stop playback
    fn stop(&mut self) -> std::result::Result<(), DeviceError>;

    /// Total device buffer size in frames
    fn buffer_size_frames(&self) -> std::result::Result<u32, DeviceError>;

    /// Frames queued in the device buffer and not yet played
    fn current_padding_frames(&self) -> std::result::Result<u32, DeviceError>;

    /// Borrow writable space for `frames` frames
    fn acquire_buffer(&mut self, frames: u32) -> std::result::Result<&mut [u8], DeviceError>;

    /// Hand back the space acquired last, committing `frames` frames
    fn release_buffer(&mut self, frames: u32) -> std::result::Result<(), DeviceError>;
}

/// Copy exactly `len` bytes of `src`, starting at `offset`, to the front of `dst`
///
/// Fails with [`Error::OutOfRange`] when either side is too short; nothing is
/// copied in that case.
pub fn copy_window(dst: &mut [u8], src: &[u8], offset: usize, len: usize) -> Result<usize> {
    let window = Position::new(offset, offset.saturating_add(len));
    if window.to > src.len() {
        return Err(Error::OutOfRange {
            position: window,
            len: src.len(),
        });
    }
    if len > dst.len() {
        return Err(Error::OutOfRange {
            position: Position::new(0, len),
            len: dst.len(),
        });
    }

    dst[..len].copy_from_slice(&src[window.range()]);
    Ok(len)
}

/// How a [`VirtualDevice`] consumes queued frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Play queued frames at the sample rate
    Realtime,
    /// Queued frames vanish immediately
    Immediate,
    /// Nothing is ever played; the buffer stays full once filled
    Stalled,
}

/// Bytes a [`VirtualDevice`] has been given, shared with observers
#[derive(Debug, Clone, Default)]
pub struct DeviceOutput(Arc<Mutex<Vec<u8>>>);

impl DeviceOutput {
    /// Number of bytes rendered so far
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Check if nothing was rendered
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Copy of everything rendered so far
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    fn extend(&self, bytes: &[u8]) {
        self.0.lock().extend_from_slice(bytes);
    }
}

/// Software render endpoint
#[derive(Debug)]
pub struct VirtualDevice {
    format: WaveFormat,
    period: Duration,
    buffer_frames: u32,
    mode: DrainMode,
    started: bool,
    queued_frames: u32,
    last_update: Instant,
    scratch: Vec<u8>,
    acquired: Option<u32>,
    output: DeviceOutput,
}

impl VirtualDevice {
    /// Create a device that plays at the sample rate
    ///
    /// The buffer holds two periods' worth of frames.
    pub fn new(format: WaveFormat, period: Duration) -> Self {
        let period_frames = (period.as_secs_f64() * f64::from(format.sample_rate)).ceil() as u32;
        Self {
            format,
            period,
            buffer_frames: period_frames.max(1) * 2,
            mode: DrainMode::Realtime,
            started: false,
            queued_frames: 0,
            last_update: Instant::now(),
            scratch: Vec::new(),
            acquired: None,
            output: DeviceOutput::default(),
        }
    }

    /// Set the buffer size in frames
    pub fn buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = frames.max(1);
        self
    }

    /// Set how queued frames are consumed
    pub fn drain_mode(mut self, mode: DrainMode) -> Self {
        self.mode = mode;
        self
    }

    /// Handle to the rendered bytes
    pub fn output(&self) -> DeviceOutput {
        self.output.clone()
    }

    /// Check if the device is started
    pub fn is_started(&self) -> bool {
        self.started
    }

    fn pending_frames(&self, now: Instant) -> u32 {
        match self.mode {
            DrainMode::Immediate => 0,
            DrainMode::Stalled => self.queued_frames,
            DrainMode::Realtime if !self.started => self.queued_frames,
            DrainMode::Realtime => {
                let elapsed = now.duration_since(self.last_update).as_secs_f64();
                let played = (elapsed * f64::from(self.format.sample_rate)) as u64;
                u64::from(self.queued_frames).saturating_sub(played) as u32
            }
        }
    }

    fn padding(&self) -> u32 {
        match self.mode {
            DrainMode::Stalled => self.buffer_frames,
            _ => self.pending_frames(Instant::now()),
        }
    }
}

impl Device for VirtualDevice {
    fn format(&self) -> WaveFormat {
        self.format
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn start(&mut self) -> std::result::Result<(), DeviceError> {
        self.queued_frames = self.pending_frames(Instant::now());
        self.last_update = Instant::now();
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> std::result::Result<(), DeviceError> {
        self.queued_frames = self.pending_frames(Instant::now());
        self.last_update = Instant::now();
        self.started = false;
        Ok(())
    }

    fn buffer_size_frames(&self) -> std::result::Result<u32, DeviceError> {
        Ok(self.buffer_frames)
    }

    fn current_padding_frames(&self) -> std::result::Result<u32, DeviceError> {
        Ok(self.padding())
    }

    fn acquire_buffer(&mut self, frames: u32) -> std::result::Result<&mut [u8], DeviceError> {
        if !self.started {
            return Err(DeviceError::Failed("device not started".into()));
        }
        if self.acquired.is_some() {
            return Err(DeviceError::Failed("buffer already acquired".into()));
        }
        if frames > self.buffer_frames.saturating_sub(self.padding()) {
            return Err(DeviceError::Busy);
        }

        let len = self.format.frames_to_bytes(frames);
        self.scratch.clear();
        self.scratch.resize(len, 0);
        self.acquired = Some(frames);
        Ok(&mut self.scratch[..])
    }

    fn release_buffer(&mut self, frames: u32) -> std::result::Result<(), DeviceError> {
        let acquired = self
            .acquired
            .take()
            .ok_or_else(|| DeviceError::Failed("no buffer acquired".into()))?;
        if frames > acquired {
            return Err(DeviceError::Failed(format!(
                "released {} frames, acquired {}",
                frames, acquired
            )));
        }

        let len = self.format.frames_to_bytes(frames);
        self.output.extend(&self.scratch[..len]);

        let now = Instant::now();
        self.queued_frames = self.pending_frames(now).saturating_add(frames);
        self.last_update = now;
        Ok(())
    }
}

//! PCM format description
//!
//! The producer publishes one [`WaveFormat`] per stream; render devices
//! report their own so the two can be compared before delivery starts.

use std::time::Duration;

use crate::error::{Error, Result};

/// Sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed little-endian integers
    Int,
    /// IEEE float
    Float,
}

/// Width of one sample in bits
///
/// Dispatch point for every width-dependent conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// 16-bit samples
    Bits16,
    /// 32-bit samples
    Bits32,
    /// 64-bit samples
    Bits64,
}

impl SampleWidth {
    /// Map a bit count to a width
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(SampleWidth::Bits16),
            32 => Ok(SampleWidth::Bits32),
            64 => Ok(SampleWidth::Bits64),
            other => Err(Error::UnsupportedFormat(format!(
                "{} bits per sample",
                other
            ))),
        }
    }

    /// Number of bits
    pub fn bits(self) -> u16 {
        match self {
            SampleWidth::Bits16 => 16,
            SampleWidth::Bits32 => 32,
            SampleWidth::Bits64 => 64,
        }
    }

    /// Number of bytes per sample
    pub fn bytes(self) -> usize {
        usize::from(self.bits() / 8)
    }
}

/// Format metadata of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    /// Sample encoding
    pub sample_format: SampleFormat,
    /// Interleaved channel count
    pub channels: u16,
    /// Frames per second
    pub sample_rate: u32,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Bytes per frame (all channels)
    pub block_align: u16,
}

impl WaveFormat {
    /// Integer PCM format with derived block alignment
    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            sample_format: SampleFormat::Int,
            channels,
            sample_rate,
            bits_per_sample,
            block_align: channels.saturating_mul(bits_per_sample / 8),
        }
    }

    /// Float PCM format with derived block alignment
    pub fn float(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            sample_format: SampleFormat::Float,
            ..Self::pcm(channels, sample_rate, bits_per_sample)
        }
    }

    /// Bytes per second
    pub fn byte_rate(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.block_align)
    }

    /// Sample width of this format
    pub fn sample_width(&self) -> Result<SampleWidth> {
        SampleWidth::from_bits(self.bits_per_sample)
    }

    /// Number of bytes occupied by `frames` frames
    pub fn frames_to_bytes(&self, frames: u32) -> usize {
        frames as usize * usize::from(self.block_align)
    }

    /// Number of frames needed to hold `bytes` bytes, rounding up
    pub fn bytes_to_frames(&self, bytes: usize) -> u32 {
        let align = usize::from(self.block_align.max(1));
        u32::try_from(bytes.div_ceil(align)).unwrap_or(u32::MAX)
    }

    /// Playback duration of `frames` frames
    pub fn frames_duration(&self, frames: u32) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(f64::from(frames) / f64::from(self.sample_rate))
    }

    /// Check whether a stream in this format can be copied byte for byte to
    /// a device using `other`
    pub fn matches(&self, other: &WaveFormat) -> bool {
        self.sample_format == other.sample_format
            && self.channels == other.channels
            && self.sample_rate == other.sample_rate
            && self.bits_per_sample == other.bits_per_sample
    }
}

impl Default for WaveFormat {
    fn default() -> Self {
        Self::float(2, 48_000, 32)
    }
}

//! Raw PCM to normalised samples
//!
//! Decodes interleaved little-endian PCM into `f64` samples in `[-1.0, 1.0]`.
//! Integer samples are scaled by the largest positive value of their width,
//! float samples pass through.

use crate::error::{Error, Result};
use crate::stream::{SampleFormat, SampleWidth, WaveFormat};

/// Which channels to keep when normalising
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSelect {
    /// Left channel duplicated to both outputs
    MonoLeft,
    /// Right channel duplicated to both outputs
    MonoRight,
    /// Every sample as is
    #[default]
    Stereo,
}

/// Largest positive integer sample of `width`
pub fn max_value(width: SampleWidth) -> i64 {
    match width {
        SampleWidth::Bits16 => i64::from(i16::MAX),
        SampleWidth::Bits32 => i64::from(i32::MAX),
        SampleWidth::Bits64 => i64::MAX,
    }
}

/// Decode one integer sample
///
/// `bytes` must hold exactly one sample of `width`.
pub fn decode_int(bytes: &[u8], width: SampleWidth) -> Result<i64> {
    let value = match width {
        SampleWidth::Bits16 => i64::from(i16::from_le_bytes(sample_bytes(bytes)?)),
        SampleWidth::Bits32 => i64::from(i32::from_le_bytes(sample_bytes(bytes)?)),
        SampleWidth::Bits64 => i64::from_le_bytes(sample_bytes(bytes)?),
    };
    Ok(value)
}

/// Scale an integer sample to `[-1.0, 1.0]`
pub fn scale(value: i64, width: SampleWidth) -> f64 {
    value as f64 / max_value(width) as f64
}

/// Decode one sample of `format` as a normalised `f64`
pub fn decode_sample(bytes: &[u8], sample_format: SampleFormat, width: SampleWidth) -> Result<f64> {
    match (sample_format, width) {
        (SampleFormat::Int, width) => Ok(scale(decode_int(bytes, width)?, width)),
        (SampleFormat::Float, SampleWidth::Bits32) => {
            Ok(f64::from(f32::from_le_bytes(sample_bytes(bytes)?)))
        }
        (SampleFormat::Float, SampleWidth::Bits64) => Ok(f64::from_le_bytes(sample_bytes(bytes)?)),
        (SampleFormat::Float, SampleWidth::Bits16) => {
            Err(Error::UnsupportedFormat("16-bit float samples".into()))
        }
    }
}

/// Normalise interleaved raw PCM
///
/// Mono selections emit every picked sample twice, keeping the output
/// stereo-interleaved. A trailing partial frame is ignored.
pub fn normalize(format: &WaveFormat, raw: &[u8], select: ChannelSelect) -> Result<Vec<f64>> {
    let width = format.sample_width()?;
    let sample_len = width.bytes();

    if select == ChannelSelect::Stereo {
        return raw
            .chunks_exact(sample_len)
            .map(|sample| decode_sample(sample, format.sample_format, width))
            .collect();
    }

    // Mono sources only have a left channel
    let channel = match select {
        ChannelSelect::MonoRight if format.channels > 1 => 1,
        _ => 0,
    };
    let offset = channel * sample_len;

    let frame_len = usize::from(format.block_align);
    if offset + sample_len > frame_len {
        return Err(Error::UnsupportedFormat(format!(
            "block align {} cannot hold channel {} of {}-byte samples",
            format.block_align, channel, sample_len
        )));
    }

    let mut out = Vec::with_capacity(raw.len() / frame_len * 2);
    for frame in raw.chunks_exact(frame_len) {
        let value = decode_sample(&frame[offset..offset + sample_len], format.sample_format, width)?;
        out.push(value);
        out.push(value);
    }
    Ok(out)
}

fn sample_bytes<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        Error::UnsupportedFormat(format!("expected {} sample bytes, got {}", N, bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm16(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_scale_by_width() {
        assert_eq!(scale(i64::from(i16::MAX), SampleWidth::Bits16), 1.0);
        assert_eq!(scale(0, SampleWidth::Bits32), 0.0);
        assert!((scale(i64::from(i32::MIN), SampleWidth::Bits32) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_int_checks_length() {
        assert_eq!(decode_int(&[0xff, 0x7f], SampleWidth::Bits16).unwrap(), 32767);
        assert_eq!(decode_int(&[0x00, 0x80], SampleWidth::Bits16).unwrap(), -32768);
        assert!(matches!(
            decode_int(&[1, 2, 3], SampleWidth::Bits32),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_normalize_stereo() {
        let format = WaveFormat::pcm(2, 48_000, 16);
        let raw = pcm16(&[i16::MAX, 0, -i16::MAX, 0]);

        let out = normalize(&format, &raw, ChannelSelect::Stereo).unwrap();
        assert_eq!(out, vec![1.0, 0.0, -1.0, 0.0]);
    }

    #[test]
    fn test_normalize_mono_selects_channel() {
        let format = WaveFormat::pcm(2, 48_000, 16);
        let raw = pcm16(&[i16::MAX, 0, 0, -i16::MAX]);

        let left = normalize(&format, &raw, ChannelSelect::MonoLeft).unwrap();
        assert_eq!(left, vec![1.0, 1.0, 0.0, 0.0]);

        let right = normalize(&format, &raw, ChannelSelect::MonoRight).unwrap();
        assert_eq!(right, vec![0.0, 0.0, -1.0, -1.0]);
    }

    #[test]
    fn test_normalize_float_passthrough() {
        let format = WaveFormat::float(1, 48_000, 32);
        let raw: Vec<u8> = [0.5f32, -0.25].iter().flat_map(|s| s.to_le_bytes()).collect();

        let out = normalize(&format, &raw, ChannelSelect::MonoRight).unwrap();
        assert_eq!(out, vec![0.5, 0.5, -0.25, -0.25]);
    }

    #[test]
    fn test_partial_frame_ignored() {
        let format = WaveFormat::pcm(2, 48_000, 16);
        let mut raw = pcm16(&[1, 2]);
        raw.push(0xaa);

        assert_eq!(normalize(&format, &raw, ChannelSelect::MonoLeft).unwrap().len(), 2);
        assert_eq!(normalize(&format, &raw, ChannelSelect::Stereo).unwrap().len(), 2);
    }

    #[test]
    fn test_mono_right_needs_room_for_channel() {
        // Two channels declared but only one sample per frame
        let fmt = WaveFormat {
            sample_format: SampleFormat::Int,
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 16,
            block_align: 2,
        };
        let raw = pcm16(&[100, 200, 300, 400]);

        assert!(matches!(
            normalize(&fmt, &raw, ChannelSelect::MonoRight),
            Err(Error::UnsupportedFormat(_))
        ));
        // The left channel still fits
        assert_eq!(normalize(&fmt, &raw, ChannelSelect::MonoLeft).unwrap().len(), 8);
    }

    #[test]
    fn test_unsupported_width() {
        let format = WaveFormat::pcm(2, 48_000, 24);
        assert!(matches!(
            normalize(&format, &[0; 12], ChannelSelect::Stereo),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}

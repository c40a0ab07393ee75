//! WAV file codec
//!
//! Decoding feeds [`FileCapture`](crate::capture::FileCapture); encoding
//! backs [`WavRecorder`], a subscriber that writes the stream to disk.

use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hound::{WavReader, WavSpec, WavWriter};
use tokio_util::sync::CancellationToken;

use crate::broadcast::{Broadcaster, Subscriber};
use crate::error::{Error, Result};
use crate::render::Termination;
use crate::stream::{Position, SampleFormat, Stream, WaveFormat};

/// Map a stream format to a WAV header spec
///
/// Supported: 16/32-bit integer and 32-bit float.
pub fn wav_spec(format: &WaveFormat) -> Result<WavSpec> {
    let sample_format = match (format.sample_format, format.bits_per_sample) {
        (SampleFormat::Int, 16 | 32) => hound::SampleFormat::Int,
        (SampleFormat::Float, 32) => hound::SampleFormat::Float,
        (sample_format, bits) => {
            return Err(Error::UnsupportedFormat(format!(
                "{:?} {}-bit WAV",
                sample_format, bits
            )))
        }
    };

    Ok(WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format,
    })
}

/// Map a WAV header spec to a stream format
pub fn wave_format(spec: &WavSpec) -> Result<WaveFormat> {
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16 | 32) => Ok(WaveFormat::pcm(
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample,
        )),
        (hound::SampleFormat::Float, 32) => Ok(WaveFormat::float(
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample,
        )),
        (sample_format, bits) => Err(Error::UnsupportedFormat(format!(
            "{:?} {}-bit WAV",
            sample_format, bits
        ))),
    }
}

/// Decode a WAV stream into its format and interleaved little-endian PCM
pub fn decode_wav<R: Read>(reader: R) -> Result<(WaveFormat, Vec<u8>)> {
    let mut reader = WavReader::new(reader)?;
    let format = wave_format(&reader.spec())?;
    let mut data = Vec::with_capacity(reader.len() as usize * usize::from(format.bits_per_sample / 8));

    match (format.sample_format, format.bits_per_sample) {
        (SampleFormat::Int, 16) => {
            for sample in reader.samples::<i16>() {
                data.extend_from_slice(&sample?.to_le_bytes());
            }
        }
        (SampleFormat::Int, _) => {
            for sample in reader.samples::<i32>() {
                data.extend_from_slice(&sample?.to_le_bytes());
            }
        }
        (SampleFormat::Float, _) => {
            for sample in reader.samples::<f32>() {
                data.extend_from_slice(&sample?.to_le_bytes());
            }
        }
    }

    Ok((format, data))
}

/// Decode a WAV file from disk
pub fn read_wav_file(path: impl AsRef<Path>) -> Result<(WaveFormat, Vec<u8>)> {
    let file = File::open(path)?;
    decode_wav(std::io::BufReader::new(file))
}

/// WAV writer fed with raw stream bytes
///
/// Bytes may arrive split anywhere; an incomplete trailing sample is kept
/// until the next push.
struct SampleSink {
    writer: WavWriter<BufWriter<File>>,
    format: WaveFormat,
    pending: Vec<u8>,
    bytes: u64,
}

impl SampleSink {
    fn create(path: &Path, format: WaveFormat) -> Result<Self> {
        let writer = WavWriter::create(path, wav_spec(&format)?)?;
        Ok(Self {
            writer,
            format,
            pending: Vec::new(),
            bytes: 0,
        })
    }

    fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        let sample_len = usize::from(self.format.bits_per_sample / 8);
        let whole = self.pending.len() - self.pending.len() % sample_len;

        for sample in self.pending[..whole].chunks_exact(sample_len) {
            match (self.format.sample_format, sample_len) {
                (SampleFormat::Int, 2) => self
                    .writer
                    .write_sample(i16::from_le_bytes([sample[0], sample[1]]))?,
                (SampleFormat::Int, _) => self.writer.write_sample(i32::from_le_bytes([
                    sample[0], sample[1], sample[2], sample[3],
                ]))?,
                (SampleFormat::Float, _) => self.writer.write_sample(f32::from_le_bytes([
                    sample[0], sample[1], sample[2], sample[3],
                ]))?,
            }
        }

        self.pending.drain(..whole);
        self.bytes += whole as u64;
        Ok(())
    }

    fn finish(self) -> Result<u64> {
        if !self.pending.is_empty() {
            tracing::debug!(bytes = self.pending.len(), "Discarding incomplete trailing sample");
        }
        self.writer.finalize()?;
        Ok(self.bytes)
    }
}

/// Summary of a finished recording
#[derive(Debug, Clone)]
pub struct RecordReport {
    /// Format written to the file header
    pub format: WaveFormat,
    /// PCM bytes written
    pub bytes: u64,
    /// Notifications received
    pub events: u64,
    /// How the recording ended
    pub termination: Termination,
}

/// Subscriber that records a stream into a WAV file
///
/// Recording starts at the beginning of the stream. Each notification
/// flushes everything written up to its end, and the remainder is flushed
/// when the broadcaster closes, so dropped notifications leave no gaps.
#[derive(Debug, Clone)]
pub struct WavRecorder {
    path: PathBuf,
}

impl WavRecorder {
    /// Record to `path`, replacing any existing file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record until the subscriber channel closes or `cancel` fires
    ///
    /// Fails with [`Error::Cancelled`] if cancelled before the stream format
    /// is known; no file is created in that case.
    pub async fn run(
        self,
        mut subscriber: Subscriber,
        stream: Arc<Stream>,
        cancel: CancellationToken,
    ) -> Result<RecordReport> {
        let format = stream.wait_ready(&cancel).await?;
        let mut sink = SampleSink::create(&self.path, format)?;
        tracing::info!(path = %self.path.display(), subscriber = %subscriber.id(), "Recording started");

        let mut written = 0usize;
        let mut events = 0u64;

        let termination = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Termination::Cancelled,
                event = subscriber.recv() => event,
            };
            let Some(event) = event else {
                break Termination::Closed;
            };
            events += 1;

            if event.position.to > written {
                let range = Position::new(written, event.position.to);
                sink.push(&stream.read(range)?)?;
                written = range.to;
            }
        };

        if termination == Termination::Closed && stream.len() > written {
            let range = Position::new(written, stream.len());
            sink.push(&stream.read(range)?)?;
        }

        let bytes = sink.finish()?;
        tracing::info!(
            path = %self.path.display(),
            bytes = bytes,
            events = events,
            termination = ?termination,
            "Recording finished"
        );

        Ok(RecordReport {
            format,
            bytes,
            events,
            termination,
        })
    }

    /// Subscribe to `broadcaster` and record until it closes or `cancel` fires
    pub async fn attach(
        self,
        broadcaster: Arc<Broadcaster>,
        cancel: CancellationToken,
    ) -> Result<RecordReport> {
        let subscriber = broadcaster.add_subscriber();
        let id = subscriber.id();
        let result = self
            .run(subscriber, Arc::clone(broadcaster.stream()), cancel)
            .await;
        broadcaster.remove_subscriber(id);
        result
    }
}

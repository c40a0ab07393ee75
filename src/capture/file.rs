//! Capture from a WAV file
//!
//! Decodes the whole file, publishes its format, then writes the PCM to the
//! broadcaster in fixed-size chunks. The broadcaster is closed when the
//! capture ends, whatever the reason.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcaster;
use crate::codec::read_wav_file;
use crate::error::{Error, Result};
use crate::render::Termination;
use crate::stream::WaveFormat;

use super::config::CaptureConfig;

/// Summary of a finished capture
#[derive(Debug, Clone)]
pub struct CaptureReport {
    /// Published stream format
    pub format: WaveFormat,
    /// Bytes written to the broadcaster
    pub bytes: u64,
    /// Number of writes
    pub chunks: u64,
    /// How the capture ended
    pub termination: Termination,
}

/// Producer that plays a WAV file into a broadcaster
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
    config: CaptureConfig,
}

impl FileCapture {
    /// Capture from `path` with default configuration
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, CaptureConfig::default())
    }

    /// Capture from `path` with custom configuration
    pub fn with_config(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Input file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the file and feed it to `broadcaster`
    pub async fn run(
        self,
        broadcaster: Arc<Broadcaster>,
        cancel: CancellationToken,
    ) -> Result<CaptureReport> {
        let path = self.path.clone();
        let decoded = tokio::task::spawn_blocking(move || read_wav_file(path))
            .await
            .map_err(|e| Error::Task {
                name: "wav-decode".into(),
                message: e.to_string(),
            })
            .and_then(|decoded| decoded);

        let (format, data) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to read capture file");
                broadcaster.close();
                return Err(e);
            }
        };

        tracing::info!(
            path = %self.path.display(),
            channels = format.channels,
            sample_rate = format.sample_rate,
            bits = format.bits_per_sample,
            bytes = data.len(),
            "Capture file decoded"
        );

        capture_pcm(&broadcaster, format, &data, &self.config, &cancel).await
    }
}

/// Publish `format` and write `data` to `broadcaster` in chunks
///
/// Closes the broadcaster on return. A broadcaster closed by someone else
/// ends the capture early without error.
pub async fn capture_pcm(
    broadcaster: &Broadcaster,
    format: WaveFormat,
    data: &[u8],
    config: &CaptureConfig,
    cancel: &CancellationToken,
) -> Result<CaptureReport> {
    let result = feed(broadcaster, format, data, config, cancel).await;
    broadcaster.close();

    if let Ok(report) = &result {
        tracing::info!(
            bytes = report.bytes,
            chunks = report.chunks,
            termination = ?report.termination,
            "Capture finished"
        );
    }
    result
}

async fn feed(
    broadcaster: &Broadcaster,
    format: WaveFormat,
    data: &[u8],
    config: &CaptureConfig,
    cancel: &CancellationToken,
) -> Result<CaptureReport> {
    broadcaster.set_format(format)?;

    let chunk_len = format.frames_to_bytes(config.chunk_frames.max(1)).max(1);
    let mut pacer = config.paced.then(|| {
        let mut pacer = interval(format.frames_duration(config.chunk_frames.max(1)));
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        pacer
    });

    let mut report = CaptureReport {
        format,
        bytes: 0,
        chunks: 0,
        termination: Termination::Closed,
    };

    for chunk in data.chunks(chunk_len) {
        if cancel.is_cancelled() {
            report.termination = Termination::Cancelled;
            return Ok(report);
        }

        if let Some(pacer) = pacer.as_mut() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.termination = Termination::Cancelled;
                    return Ok(report);
                }
                _ = pacer.tick() => {}
            }
        }

        match broadcaster.write(chunk) {
            Ok(_) => {}
            Err(Error::ChannelClosed) => {
                tracing::debug!("Broadcaster closed during capture");
                return Ok(report);
            }
            Err(e) => return Err(e),
        }

        report.chunks += 1;
        report.bytes += chunk.len() as u64;

        if pacer.is_none() {
            // Unpaced capture still lets consumers run between chunks
            tokio::task::yield_now().await;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::broadcast::BroadcastConfig;

    fn tone(frames: usize) -> Vec<u8> {
        (0..frames * 2)
            .flat_map(|i| ((i % 200) as i16 * 100).to_le_bytes())
            .collect()
    }

    #[tokio::test]
    async fn test_capture_writes_all_chunks() {
        let mux = Broadcaster::with_config(BroadcastConfig::default().subscriber_capacity(16));
        let mut sub = mux.add_subscriber();
        let format = WaveFormat::pcm(2, 48_000, 16);
        let data = tone(1000);

        let config = CaptureConfig::default().chunk_frames(400);
        let report = capture_pcm(&mux, format, &data, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::Closed);
        assert_eq!(report.bytes, 4000);
        // 400 + 400 + 200 frames
        assert_eq!(report.chunks, 3);
        assert!(mux.is_closed());
        assert_eq!(mux.stream().format(), Some(format));

        let mut lens = Vec::new();
        while let Some(event) = sub.recv().await {
            lens.push(event.len());
        }
        assert_eq!(lens, vec![1600, 1600, 800]);
        assert_eq!(mux.read(crate::stream::Position::new(0, 4000)).unwrap(), data);
    }

    #[tokio::test]
    async fn test_capture_cancelled() {
        let mux = Broadcaster::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = capture_pcm(
            &mux,
            WaveFormat::pcm(2, 48_000, 16),
            &tone(1000),
            &CaptureConfig::default(),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(report.termination, Termination::Cancelled);
        assert_eq!(report.chunks, 0);
        assert!(mux.is_closed());
    }

    #[tokio::test]
    async fn test_paced_capture_takes_real_time() {
        let mux = Broadcaster::new();
        let format = WaveFormat::pcm(2, 1_000, 16);
        // 40 frames at 1kHz in chunks of 10 frames: 4 ticks, 30ms after the first
        let config = CaptureConfig::default().chunk_frames(10).paced(true);

        let start = Instant::now();
        capture_pcm(&mux, format, &tone(40), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_capture_rejects_second_format() {
        let mux = Broadcaster::new();
        mux.set_format(WaveFormat::default()).unwrap();

        let result = capture_pcm(
            &mux,
            WaveFormat::pcm(2, 48_000, 16),
            &tone(10),
            &CaptureConfig::default(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(Error::FormatAlreadySet)));
        assert!(mux.is_closed());
    }

    #[tokio::test]
    async fn test_file_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..960i16 {
            writer.write_sample(i).unwrap();
        }
        writer.finalize().unwrap();

        let mux = Arc::new(Broadcaster::new());
        let report = FileCapture::new(&path)
            .run(Arc::clone(&mux), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.format, WaveFormat::pcm(2, 48_000, 16));
        assert_eq!(report.bytes, 1920);
        assert_eq!(report.chunks, 1);
        assert_eq!(mux.stream().len(), 1920);
        assert!(mux.stream().is_closed());
    }

    #[tokio::test]
    async fn test_missing_file_closes_broadcaster() {
        let dir = tempfile::tempdir().unwrap();
        let mux = Arc::new(Broadcaster::new());

        let result = FileCapture::new(dir.path().join("missing.wav"))
            .run(Arc::clone(&mux), CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert!(mux.is_closed());
        assert!(mux.stream().format().is_none());
    }
}

//! Record a broadcast stream to a WAV file
//!
//! Run with: cargo run --example wav_recorder [OUTPUT.wav] [MONO_LEFT|MONO_RIGHT|STEREO]
//!
//! A 16-bit stereo test signal (left: 440 Hz, right: 660 Hz) is captured in
//! real time while a recorder subscriber writes it to disk. Afterwards the
//! file is read back and the peak level of the selected channel is printed.

use std::sync::Arc;

use pcm_relay::capture::{capture_pcm, CaptureConfig};
use pcm_relay::codec::{normalize, read_wav_file, ChannelSelect, WavRecorder};
use pcm_relay::{Broadcaster, TaskGroup, WaveFormat};

fn test_signal(format: &WaveFormat, seconds: f64) -> Vec<u8> {
    let rate = f64::from(format.sample_rate);
    let frames = (seconds * rate) as usize;
    let mut data = Vec::with_capacity(frames * usize::from(format.block_align));

    for i in 0..frames {
        let t = i as f64 / rate;
        let left = (t * 440.0 * std::f64::consts::TAU).sin() * 0.8;
        let right = (t * 660.0 * std::f64::consts::TAU).sin() * 0.4;
        for sample in [left, right] {
            data.extend_from_slice(&((sample * f64::from(i16::MAX)) as i16).to_le_bytes());
        }
    }
    data
}

fn parse_select(arg: Option<String>) -> ChannelSelect {
    match arg.as_deref() {
        Some("MONO_LEFT") => ChannelSelect::MonoLeft,
        Some("MONO_RIGHT") => ChannelSelect::MonoRight,
        _ => ChannelSelect::Stereo,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pcm_relay=info".parse()?)
                .add_directive("wav_recorder=debug".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "recording.wav".to_string());
    let select = parse_select(args.next());

    let format = WaveFormat::pcm(2, 48_000, 16);
    let mux = Arc::new(Broadcaster::new());
    let recorder = WavRecorder::new(&output);
    let subscriber = mux.add_subscriber();

    let mut tasks = TaskGroup::new();
    {
        let stream = Arc::clone(mux.stream());
        tasks.spawn("record", move |cancel| async move {
            let report = recorder.run(subscriber, stream, cancel).await?;
            tracing::info!(bytes = report.bytes, events = report.events, "Recorder finished");
            Ok(())
        });
    }
    {
        let mux = Arc::clone(&mux);
        tasks.spawn("capture", move |cancel| async move {
            let data = test_signal(&format, 1.0);
            let config = CaptureConfig::default().paced(true);
            capture_pcm(&mux, format, &data, &config, &cancel).await?;
            Ok(())
        });
    }
    tasks.join_all().await?;

    let (format, data) = read_wav_file(&output)?;
    let samples = normalize(&format, &data, select)?;
    let peak = samples.iter().fold(0.0f64, |peak, s| peak.max(s.abs()));

    let stats = mux.stats();
    println!("Wrote {} ({} bytes, {} notifications dropped)", output, data.len(), stats.notifications_dropped);
    println!("Peak level ({:?}): {:.3}", select, peak);

    Ok(())
}

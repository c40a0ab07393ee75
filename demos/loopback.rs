//! Play a WAV file (or a generated tone) through two virtual devices
//!
//! Run with: cargo run --example loopback [FILE.wav]
//!
//! Without a file a decaying 440 Hz tone is played. Two render sessions
//! subscribe to the same broadcaster: one plays in real time, one is
//! stalled and only drops events. Set `RUST_LOG=pcm_relay=trace` to see
//! every event.

use std::sync::Arc;
use std::time::Duration;

use pcm_relay::capture::{capture_pcm, CaptureConfig, FileCapture};
use pcm_relay::render::{DrainMode, RenderConfig, RenderSession, VirtualDevice};
use pcm_relay::{BroadcastConfig, Broadcaster, TaskGroup, WaveFormat};

/// Decaying sine tone as 32-bit float stereo
fn tone(format: &WaveFormat, seconds: f64, frequency: f64) -> Vec<u8> {
    let frames = (seconds * f64::from(format.sample_rate)) as usize;
    let decay = (1.0e-4f64).powf(1.0 / frames as f64);
    let step = std::f64::consts::TAU * frequency / f64::from(format.sample_rate);

    let mut amplitude = 1.0;
    let mut data = Vec::with_capacity(frames * usize::from(format.block_align));
    for i in 0..frames {
        let sample = ((step * i as f64).sin() * amplitude) as f32;
        amplitude *= decay;
        for _ in 0..format.channels {
            data.extend_from_slice(&sample.to_le_bytes());
        }
    }
    data
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pcm_relay=debug".parse()?)
                .add_directive("loopback=debug".parse()?),
        )
        .init();

    let input = std::env::args().nth(1);
    let format = WaveFormat::float(2, 48_000, 32);

    let mux = Arc::new(Broadcaster::with_config(
        BroadcastConfig::default().subscriber_capacity(8),
    ));

    let speaker = VirtualDevice::new(format, Duration::from_millis(10));
    let stalled = VirtualDevice::new(format, Duration::from_millis(10)).drain_mode(DrainMode::Stalled);
    let played = speaker.output();

    let speaker = RenderSession::new(speaker);
    let stalled = RenderSession::with_config(stalled, RenderConfig::default().queue_capacity(16));
    let stalled_counters = stalled.counters();

    // Subscribe before the producer starts so nothing is missed
    let speaker_sub = mux.add_subscriber();
    let stalled_sub = mux.add_subscriber();

    let mut tasks = TaskGroup::new();
    {
        let stream = Arc::clone(mux.stream());
        tasks.spawn("speaker", move |cancel| async move {
            let report = speaker.run(speaker_sub, stream, cancel).await?;
            tracing::info!(
                events = report.stats.events_rendered,
                bytes = report.stats.bytes_rendered,
                duration_ms = report.duration.as_millis() as u64,
                "Speaker finished"
            );
            Ok(())
        });
    }
    {
        let stream = Arc::clone(mux.stream());
        let watcher = Arc::clone(mux.stream());
        tasks.spawn("stalled", move |cancel| async move {
            // The stalled device never finishes on its own; stop it once the
            // producer is done
            let stop = cancel.child_token();
            let stopper = stop.clone();
            tokio::spawn(async move {
                if watcher.wait_done(&stopper).await.is_ok() {
                    stopper.cancel();
                }
            });
            stalled.run(stalled_sub, stream, stop).await?;
            Ok(())
        });
    }
    {
        let mux = Arc::clone(&mux);
        tasks.spawn("capture", move |cancel| async move {
            let config = CaptureConfig::default().paced(true);
            let report = match input {
                Some(path) => FileCapture::with_config(path, config).run(mux, cancel).await?,
                None => {
                    let data = tone(&format, 2.0, 440.0);
                    capture_pcm(&mux, format, &data, &config, &cancel).await?
                }
            };
            tracing::info!(bytes = report.bytes, chunks = report.chunks, "Capture finished");
            Ok(())
        });
    }

    tokio::select! {
        result = tasks.join_all() => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted");
            return Ok(());
        }
    }

    let broadcast = mux.stats();
    let stalled = stalled_counters.snapshot();
    println!("Broadcast:  {} writes, {} bytes, {} notifications dropped",
        broadcast.writes, broadcast.bytes_written, broadcast.notifications_dropped);
    println!("Speaker:    {} bytes played", played.len());
    println!("Stalled:    {} events received, {} dropped by its queue",
        stalled.events_received, stalled.events_dropped);

    Ok(())
}

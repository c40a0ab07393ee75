//! Render session
//!
//! Glues one subscriber to one device:
//!
//! 1. wait for the stream format (cancellable)
//! 2. start the device
//! 3. run the collector as a separate task and the driver inline
//! 4. when the driver finishes, stop the collector and the device
//!
//! A fatal driver error still stops the device before it is returned.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::broadcast::{Broadcaster, Subscriber};
use crate::error::{Error, Result};
use crate::stats::{PipelineCounters, PipelineStats};
use crate::stream::Stream;

use super::collector::{event_queue, Collector};
use super::config::RenderConfig;
use super::device::{Device, DeviceOp};
use super::driver::Driver;
use super::state::{SessionState, Termination};

/// Summary of a finished render session
#[derive(Debug, Clone)]
pub struct RenderReport {
    /// How the session ended
    pub termination: Termination,
    /// Counters at shutdown
    pub stats: PipelineStats,
    /// Time spent delivering
    pub duration: Duration,
}

/// Two-stage consumer rendering one subscriber to a device
pub struct RenderSession<D: Device> {
    device: D,
    config: RenderConfig,
    counters: Arc<PipelineCounters>,
    state: Arc<SessionState>,
}

impl<D: Device> RenderSession<D> {
    /// Create a session with default configuration
    pub fn new(device: D) -> Self {
        Self::with_config(device, RenderConfig::default())
    }

    /// Create a session with custom configuration
    pub fn with_config(device: D, config: RenderConfig) -> Self {
        Self {
            device,
            config,
            counters: Arc::new(PipelineCounters::default()),
            state: Arc::new(SessionState::new()),
        }
    }

    /// Live counters, readable while the session runs
    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    /// Live lifecycle state, readable while the session runs
    pub fn state(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    /// Render `subscriber`'s events from `stream` until the subscriber
    /// channel closes or `cancel` fires
    pub async fn run(
        mut self,
        subscriber: Subscriber,
        stream: Arc<Stream>,
        cancel: CancellationToken,
    ) -> Result<RenderReport> {
        let format = match stream.wait_ready(&cancel).await {
            Ok(format) => format,
            Err(Error::Cancelled) => {
                tracing::debug!(subscriber = %subscriber.id(), "Cancelled before stream was ready");
                return Ok(self.finish(Termination::Cancelled));
            }
            Err(Error::ChannelClosed) => {
                tracing::debug!(subscriber = %subscriber.id(), "Stream closed without a format");
                return Ok(self.finish(Termination::Closed));
            }
            Err(e) => return Err(e),
        };

        let device_format = self.device.format();
        if !format.matches(&device_format) {
            tracing::warn!(
                stream_rate = format.sample_rate,
                stream_channels = format.channels,
                stream_bits = format.bits_per_sample,
                device_rate = device_format.sample_rate,
                device_channels = device_format.channels,
                device_bits = device_format.bits_per_sample,
                "Stream and device formats differ, rendering unconverted"
            );
        }

        if let Err(e) = self.device.start() {
            tracing::error!(error = %e, "Failed to start device");
            self.state.stop();
            return Err(Error::device(DeviceOp::Start, e));
        }

        self.state.start();
        let poll_interval = self.config.effective_poll_interval(self.device.period());
        tracing::info!(
            subscriber = %subscriber.id(),
            queue_capacity = self.config.queue_capacity,
            poll_ms = poll_interval.as_millis() as u64,
            "Render session started"
        );

        // Stops the collector without cancelling the caller's token
        let stage_cancel = cancel.child_token();
        let (queue_tx, queue_rx) = event_queue(self.config.queue_capacity);
        let collector = Collector::new(subscriber, queue_tx, Arc::clone(&self.counters));
        let collector = tokio::spawn(collector.run(stage_cancel.clone()));

        let result = {
            let mut driver = Driver::new(
                &mut self.device,
                queue_rx,
                Arc::clone(&self.counters),
                Arc::clone(&self.state),
                poll_interval,
            );
            driver.run(&stage_cancel).await
        };

        stage_cancel.cancel();
        if let Err(e) = collector.await {
            tracing::warn!(error = %e, "Collector task failed");
        }

        if let Err(e) = self.device.stop() {
            tracing::warn!(error = %e, "Failed to stop device");
        }

        match result {
            Ok(termination) => {
                let report = self.finish(termination);
                tracing::info!(
                    termination = ?report.termination,
                    events = report.stats.events_rendered,
                    dropped = report.stats.events_dropped,
                    bytes = report.stats.bytes_rendered,
                    "Render session stopped"
                );
                Ok(report)
            }
            Err(e) => {
                self.state.stop();
                tracing::error!(error = %e, "Render session failed");
                Err(e)
            }
        }
    }

    /// Subscribe to `broadcaster` and render until it closes or `cancel` fires
    ///
    /// The subscriber is removed again when the session ends.
    pub async fn attach(
        self,
        broadcaster: Arc<Broadcaster>,
        cancel: CancellationToken,
    ) -> Result<RenderReport> {
        let subscriber = broadcaster.add_subscriber();
        let id = subscriber.id();
        let stream = Arc::clone(broadcaster.stream());

        let result = self.run(subscriber, stream, cancel).await;
        broadcaster.remove_subscriber(id);
        result
    }

    fn finish(&self, termination: Termination) -> RenderReport {
        self.state.stop();
        RenderReport {
            termination,
            stats: self.counters.snapshot(),
            duration: self.state.running_duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastConfig;
    use crate::render::device::{DrainMode, VirtualDevice};
    use crate::render::SessionPhase;
    use crate::stream::WaveFormat;

    fn format() -> WaveFormat {
        WaveFormat::pcm(2, 48_000, 16)
    }

    fn immediate_device() -> VirtualDevice {
        VirtualDevice::new(format(), Duration::from_millis(10)).drain_mode(DrainMode::Immediate)
    }

    #[tokio::test]
    async fn test_renders_until_broadcaster_closes() {
        let mux = Arc::new(Broadcaster::with_config(
            BroadcastConfig::default().subscriber_capacity(64),
        ));
        let device = immediate_device();
        let output = device.output();
        let session = RenderSession::new(device);
        let state = session.state();

        let handle = tokio::spawn(session.attach(Arc::clone(&mux), CancellationToken::new()));
        // Let the session register before writing
        while mux.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }

        mux.set_format(format()).unwrap();
        let mut expected = Vec::new();
        for i in 0..10u8 {
            let chunk = [i; 96];
            mux.write(&chunk).unwrap();
            expected.extend_from_slice(&chunk);
        }
        mux.close();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.termination, Termination::Closed);
        assert_eq!(report.stats.events_rendered, 10);
        assert_eq!(output.to_vec(), expected);
        assert_eq!(state.phase(), SessionPhase::Stopped);
        assert_eq!(mux.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_ready() {
        let mux = Arc::new(Broadcaster::new());
        let device = immediate_device();
        let cancel = CancellationToken::new();

        let session = RenderSession::new(device);
        let handle = tokio::spawn(session.attach(Arc::clone(&mux), cancel.clone()));
        cancel.cancel();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.termination, Termination::Cancelled);
        assert_eq!(report.duration, Duration::ZERO);
        assert_eq!(report.stats, PipelineStats::default());
    }

    #[tokio::test]
    async fn test_cancel_while_device_stalled() {
        let mux = Arc::new(Broadcaster::new());
        mux.set_format(format()).unwrap();

        let device = VirtualDevice::new(format(), Duration::from_millis(10))
            .drain_mode(DrainMode::Stalled);
        let session = RenderSession::new(device);
        let counters = session.counters();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(session.attach(Arc::clone(&mux), cancel.clone()));
        while mux.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        mux.write(&[0u8; 64]).unwrap();

        while counters.snapshot().device_waits == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.termination, Termination::Cancelled);
        assert_eq!(report.stats.events_rendered, 0);
        assert!(!mux.is_closed());
    }

    #[tokio::test]
    async fn test_format_mismatch_still_renders() {
        let mux = Arc::new(Broadcaster::with_config(
            BroadcastConfig::default().subscriber_capacity(4),
        ));
        mux.set_format(WaveFormat::float(2, 44_100, 32)).unwrap();

        let device = immediate_device();
        let output = device.output();
        let subscriber = mux.add_subscriber();
        mux.write(&[7u8; 16]).unwrap();
        mux.close();

        let report = RenderSession::new(device)
            .run(subscriber, Arc::clone(mux.stream()), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::Closed);
        assert_eq!(output.to_vec(), vec![7u8; 16]);
    }
}

//! # pcm-relay
//!
//! In-process PCM audio relay: one producer appends raw audio to a growable
//! stream, a broadcaster notifies any number of subscribers of each written
//! range, and render sessions pace those ranges into output devices.
//!
//! ```text
//!   FileCapture ──write──► Broadcaster ──try_send──► Subscriber ──► RenderSession ──► Device
//!                              │                         └────────► WavRecorder   ──► file
//!                              ▼
//!                            Stream (append-only bytes, format, ready/done)
//! ```
//!
//! The producer never waits for a consumer. A subscriber whose channel is
//! full misses that notification, and a render session whose queue is full
//! drops the event; the bytes stay in the stream either way.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pcm_relay::capture::FileCapture;
//! use pcm_relay::render::{RenderSession, VirtualDevice};
//! use pcm_relay::{Broadcaster, TaskGroup, WaveFormat};
//!
//! #[tokio::main]
//! async fn main() -> pcm_relay::Result<()> {
//!     let mux = Arc::new(Broadcaster::new());
//!     let device = VirtualDevice::new(WaveFormat::pcm(2, 48_000, 16), Duration::from_millis(10));
//!
//!     let mut tasks = TaskGroup::new();
//!     let render = RenderSession::new(device);
//!     let m = Arc::clone(&mux);
//!     tasks.spawn("render", move |cancel| async move {
//!         render.attach(m, cancel).await.map(|_| ())
//!     });
//!     tasks.spawn("capture", move |cancel| async move {
//!         FileCapture::new("input.wav").run(mux, cancel).await.map(|_| ())
//!     });
//!     tasks.join_all().await
//! }
//! ```

pub mod broadcast;
pub mod capture;
pub mod codec;
pub mod error;
pub mod render;
pub mod stats;
pub mod stream;
pub mod task;

pub use broadcast::{BroadcastConfig, Broadcaster, Subscriber, Subscription};
pub use error::{Error, Result};
pub use stream::{Position, Stream, WaveFormat};
pub use task::TaskGroup;

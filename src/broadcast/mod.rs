//! Multi-subscriber broadcast of stream writes
//!
//! The broadcaster owns the stream and turns every write into a
//! [`Subscription`] event pushed to each subscriber channel.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<Broadcaster>
//!                     ┌─────────────────────────┐
//!                     │ stream: Arc<Stream>     │
//!                     │ subscribers: Mutex<     │
//!                     │   Vec<(id, mpsc::Tx)>   │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Producer]             [Subscriber]            [Subscriber]
//!    write(bytes)           sub.recv()              sub.recv()
//!         │                       │                       │
//!         └──► try_send(pos) ──► render session    ──► WAV recorder
//! ```
//!
//! # Drop on full
//!
//! Delivery never waits. A subscriber whose channel is full simply misses the
//! notification and the drop is counted in [`BroadcastStats`](crate::stats::BroadcastStats).
//! The bytes themselves stay in the stream, so a consumer that falls behind
//! can still read any range it was told about.

pub mod broadcaster;
pub mod config;
pub mod subscription;

pub use broadcaster::Broadcaster;
pub use config::BroadcastConfig;
pub use subscription::{Subscriber, SubscriberId, Subscription};

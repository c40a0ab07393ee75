//! Render pipeline
//!
//! Every render session consumes one subscriber in two stages connected by
//! a bounded queue:
//!
//! ```text
//!   Broadcaster ──try_send──► Subscriber channel
//!                                   │
//!                        ┌──────────▼──────────┐
//!                        │ Collector (task)    │  never blocks; drops on full
//!                        └──────────┬──────────┘
//!                                   │ try_send
//!                        ┌──────────▼──────────┐
//!                        │ queue (capacity 200)│
//!                        └──────────┬──────────┘
//!                                   │ recv
//!                        ┌──────────▼──────────┐
//!                        │ Driver              │  padding → acquire → copy
//!                        └──────────┬──────────┘  → release, polling when full
//!                                   ▼
//!                                Device
//! ```
//!
//! One [`CancellationToken`](tokio_util::sync::CancellationToken) reaches
//! the ready wait, the queue pop and the device-space wait.

pub mod collector;
pub mod config;
pub mod device;
pub mod driver;
pub mod session;
pub mod state;

pub use collector::{event_queue, Collector, QueueReceiver, QueueSender};
pub use config::RenderConfig;
pub use device::{copy_window, Device, DeviceError, DeviceOp, DeviceOutput, DrainMode, VirtualDevice};
pub use driver::Driver;
pub use session::{RenderReport, RenderSession};
pub use state::{SessionPhase, SessionState, Termination};

//! Growable PCM stream
//!
//! The stream is the single source of truth for captured audio. Producers
//! append to it, consumers read back the ranges they were told about.
//!
//! ```text
//!   capture thread                  render sessions
//!        │                       ┌──────────────────┐
//!        │ write(bytes)          │ read([from, to)) │
//!        ▼                       └────────▲─────────┘
//!   ┌───────────────────────────────────────┴──────┐
//!   │ Stream                                       │
//!   │   buffer: RwLock<StreamBuffer>  (append-only)│
//!   │   format: set once ──► ready: Signal         │
//!   │   close()         ──► done:  Signal          │
//!   └──────────────────────────────────────────────┘
//! ```

pub mod buffer;
pub mod format;
pub mod position;
pub mod signal;
pub mod store;

pub use buffer::{StreamBuffer, SMALL_BUFFER_SIZE};
pub use format::{SampleFormat, SampleWidth, WaveFormat};
pub use position::Position;
pub use signal::Signal;
pub use store::Stream;

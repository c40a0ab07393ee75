//! Producers feeding a broadcaster
//!
//! A capture publishes the stream format first, then writes PCM chunks and
//! closes the broadcaster when it is done:
//!
//! ```text
//!   WAV file ──decode──► set_format ──► write ─► write ─► … ─► close
//!                             │            │
//!                        ready fires   subscribers notified
//! ```

pub mod config;
pub mod file;

pub use config::CaptureConfig;
pub use file::{capture_pcm, CaptureReport, FileCapture};

//! Error types
//!
//! A single error enum covers the whole pipeline. Transient device conditions
//! are normally absorbed inside the render driver and only surface here when
//! a caller talks to a [`Device`](crate::render::Device) directly.

use crate::render::{DeviceError, DeviceOp};
use crate::stream::Position;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for stream, broadcast and render operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Buffer growth would exceed the representable capacity
    #[error("stream buffer too large: {requested} bytes requested")]
    TooLarge {
        /// Total number of bytes the buffer would have to hold
        requested: usize,
    },

    /// A read asked for bytes that have not been written yet
    #[error("read {position} out of range, stream holds {len} bytes")]
    OutOfRange {
        /// Requested range
        position: Position,
        /// Stream length at the time of the read
        len: usize,
    },

    /// The stream format was already published
    #[error("stream format already set")]
    FormatAlreadySet,

    /// Device has no space or is not ready yet
    #[error("device busy")]
    DeviceBusy,

    /// Device call failed
    #[error("device {op} failed: {source}")]
    Device {
        /// Which device call failed
        op: DeviceOp,
        /// Underlying device error
        #[source]
        source: DeviceError,
    },

    /// Subscriber channel or event queue closed
    #[error("channel closed")]
    ChannelClosed,

    /// Cooperative cancellation observed
    #[error("cancelled")]
    Cancelled,

    /// Format cannot be handled by this component
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// WAV decode/encode failure
    #[error("wav codec error: {0}")]
    Wav(#[from] hound::Error),

    /// I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A task of a [`TaskGroup`](crate::task::TaskGroup) failed or panicked
    #[error("task {name} failed: {message}")]
    Task {
        /// Task name
        name: String,
        /// Failure description
        message: String,
    },
}

impl Error {
    /// Build a device error for the given call
    pub fn device(op: DeviceOp, source: DeviceError) -> Self {
        match source {
            DeviceError::Busy => Error::DeviceBusy,
            source => Error::Device { op, source },
        }
    }

    /// True for the outcomes that end a task without anything going wrong
    pub fn is_normal_termination(&self) -> bool {
        matches!(self, Error::ChannelClosed | Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_termination() {
        assert!(Error::Cancelled.is_normal_termination());
        assert!(Error::ChannelClosed.is_normal_termination());
        assert!(!Error::DeviceBusy.is_normal_termination());
        assert!(!Error::TooLarge { requested: 1 }.is_normal_termination());
    }

    #[test]
    fn test_device_busy_maps_to_transient_variant() {
        let err = Error::device(DeviceOp::Acquire, DeviceError::Busy);
        assert!(matches!(err, Error::DeviceBusy));

        let err = Error::device(DeviceOp::Release, DeviceError::Failed("gone".into()));
        assert!(matches!(
            err,
            Error::Device {
                op: DeviceOp::Release,
                ..
            }
        ));
        assert_eq!(err.to_string(), "device release failed: gone");
    }

    #[test]
    fn test_out_of_range_message() {
        let err = Error::OutOfRange {
            position: Position::new(10, 20),
            len: 15,
        };
        assert_eq!(
            err.to_string(),
            "read [10, 20) out of range, stream holds 15 bytes"
        );
    }
}

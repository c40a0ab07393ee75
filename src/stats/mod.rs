//! Statistics and metrics

pub mod metrics;

pub(crate) use metrics::BroadcastCounters;
pub use metrics::{BroadcastStats, PipelineCounters, PipelineStats};

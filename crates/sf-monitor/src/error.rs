//! Error types for the monitor pipeline

use thiserror::Error;

/// Monitor pipeline error type
///
/// Only raised outside the per-cycle path: configuration validation at
/// construction and channel attachment at topology-change time. Everything
/// the cycle itself can hit degrades in-band instead (silence, sample drop,
/// counter reset).
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Channel capacity exceeded: {max} inputs already attached")]
    ChannelCapacity { max: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type MonitorResult<T> = Result<T, MonitorError>;

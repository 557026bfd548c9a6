//! Monitor construction parameters

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Default maximum number of attachable input channels
pub const DEFAULT_MAX_CHANNELS: usize = 2048;

/// Default per-channel capacity of each overflow buffer, in samples
pub const DEFAULT_OVERFLOW_CAPACITY: usize = 10_000;

/// Default acquisition-side sample rate in Hz
pub const DEFAULT_CORE_SAMPLE_RATE: f64 = 44_100.0;

/// Default output block target before the first rate negotiation
pub const DEFAULT_SAMPLES_EXPECTED: usize = 1024;

/// Construction-time configuration for the monitor pipeline
///
/// Validated once in [`MonitorMixer::new`](crate::MonitorMixer::new); no
/// field is re-checked on the cycle path. All buffer allocation derives from
/// these values, so exceeding them later surfaces as attach rejection or the
/// overflow drop policy rather than reallocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Upper bound on attachable input channels
    pub max_channels: usize,
    /// Capacity of each overflow buffer, in stereo samples
    pub overflow_capacity: usize,
    /// Acquisition-side sample rate in Hz
    pub core_sample_rate: f64,
    /// Output samples per cycle until the first rate negotiation
    pub samples_expected: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_channels: DEFAULT_MAX_CHANNELS,
            overflow_capacity: DEFAULT_OVERFLOW_CAPACITY,
            core_sample_rate: DEFAULT_CORE_SAMPLE_RATE,
            samples_expected: DEFAULT_SAMPLES_EXPECTED,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> MonitorResult<()> {
        if self.max_channels == 0 {
            return Err(MonitorError::InvalidConfig(
                "max_channels must be at least 1".into(),
            ));
        }
        if self.overflow_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "overflow_capacity must be at least 1".into(),
            ));
        }
        if self.samples_expected == 0 {
            return Err(MonitorError::InvalidConfig(
                "samples_expected must be at least 1".into(),
            ));
        }
        if !self.core_sample_rate.is_finite() || self.core_sample_rate <= 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "core_sample_rate must be a positive finite rate, got {}",
                self.core_sample_rate
            )));
        }
        Ok(())
    }
}

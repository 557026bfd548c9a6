//! Upstream channel metadata

use serde::{Deserialize, Serialize};

use crate::Sample;

/// Maximum magnitude of the 16-bit raw sample format
pub const FULL_SCALE: Sample = 32767.0;

/// Smallest calibration factor accepted when deriving gain
pub const MIN_BIT_VOLTS: Sample = 1e-9;

/// Identity and calibration snapshot of an upstream acquisition channel
///
/// Taken when the channel is wired into the monitor. The snapshot carries
/// identity and calibration only; it is never used to reach back into the
/// upstream signal chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSource {
    /// Stable identifier assigned by the signal-chain topology
    pub id: u32,
    /// Microvolts per raw sample unit
    pub bit_volts: Sample,
    /// Display name
    pub label: String,
}

impl ChannelSource {
    pub fn new(id: u32, bit_volts: Sample) -> Self {
        Self {
            id,
            bit_volts,
            label: format!("CH{id}"),
        }
    }

    pub fn with_label(id: u32, bit_volts: Sample, label: impl Into<String>) -> Self {
        Self {
            id,
            bit_volts,
            label: label.into(),
        }
    }

    /// Calibration factor, clamped away from zero
    #[inline]
    pub fn calibration(&self) -> Sample {
        self.bit_volts.max(MIN_BIT_VOLTS)
    }
}

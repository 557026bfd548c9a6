//! Lock-free output metering
//!
//! Peak and RMS of the mixed stereo feed, published by the audio thread
//! after the dynamics stage and read by the UI through the handle. Values
//! are f64 bit-cast into atomics; no lock is ever taken on either side.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Peak/RMS meter values for the mixed output (atomic for lock-free access)
#[derive(Debug, Default)]
pub struct OutputMeters {
    left_peak: AtomicU64,
    right_peak: AtomicU64,
    left_rms: AtomicU64,
    right_rms: AtomicU64,
    clipped: AtomicBool,
}

impl OutputMeters {
    pub fn left_peak(&self) -> f64 {
        f64::from_bits(self.left_peak.load(Ordering::Relaxed))
    }

    pub fn right_peak(&self) -> f64 {
        f64::from_bits(self.right_peak.load(Ordering::Relaxed))
    }

    pub fn left_rms(&self) -> f64 {
        f64::from_bits(self.left_rms.load(Ordering::Relaxed))
    }

    pub fn right_rms(&self) -> f64 {
        f64::from_bits(self.right_rms.load(Ordering::Relaxed))
    }

    pub fn set_left_peak(&self, value: f64) {
        self.left_peak.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_right_peak(&self, value: f64) {
        self.right_peak.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_left_rms(&self, value: f64) {
        self.left_rms.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_right_rms(&self, value: f64) {
        self.right_rms.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Latch the clip indicator; stays set until [`reset_clip`](Self::reset_clip)
    pub fn mark_clipped(&self) {
        self.clipped.store(true, Ordering::Relaxed);
    }

    pub fn is_clipped(&self) -> bool {
        self.clipped.load(Ordering::Relaxed)
    }

    pub fn reset_clip(&self) {
        self.clipped.store(false, Ordering::Relaxed);
    }

    /// Zero all values and the clip latch
    pub fn reset(&self) {
        self.set_left_peak(0.0);
        self.set_right_peak(0.0);
        self.set_left_rms(0.0);
        self.set_right_rms(0.0);
        self.reset_clip();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_f64_values() {
        let meters = OutputMeters::default();
        meters.set_left_peak(0.75);
        meters.set_right_peak(0.5);
        meters.set_left_rms(0.3);
        meters.set_right_rms(0.2);

        assert_eq!(meters.left_peak(), 0.75);
        assert_eq!(meters.right_peak(), 0.5);
        assert_eq!(meters.left_rms(), 0.3);
        assert_eq!(meters.right_rms(), 0.2);
    }

    #[test]
    fn clip_latch_holds_until_reset() {
        let meters = OutputMeters::default();
        assert!(!meters.is_clipped());

        meters.mark_clipped();
        assert!(meters.is_clipped());
        assert!(meters.is_clipped());

        meters.reset_clip();
        assert!(!meters.is_clipped());
    }
}
